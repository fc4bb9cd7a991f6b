//! Message and content block decoding tests.


/// Verify the public protocol types are exported from the library.
#[test]
fn test_protocol_types_exported() {
    use claude_agent::protocol::{
        AssistantMessage, ContentBlock, GenericMessage, JsonObject, Message, MessageKind,
        ModelUsage, ResultMessage, SystemMessage, UserContent, UserMessage, UNKNOWN_MESSAGE_TYPE,
    };

    let _ = ModelUsage::default();
    let _ = ContentBlock::from_json(&JsonObject::new());
    let _ = UserContent::Text(String::new());
    let message = Message::from_json(JsonObject::new());
    assert_eq!(message.kind(), MessageKind::Generic);
    assert_eq!(message.type_name(), UNKNOWN_MESSAGE_TYPE);

    let _: fn(&Message) -> Option<&AssistantMessage> = |m| match m {
        Message::Assistant(a) => Some(a),
        _ => None,
    };
    let _: fn(&Message) -> Option<&ResultMessage> = |m| match m {
        Message::Result(r) => Some(r),
        _ => None,
    };
    let _: fn(&Message) -> bool = |m| {
        matches!(
            m,
            Message::System(SystemMessage { .. })
                | Message::User(UserMessage { .. })
                | Message::Generic(GenericMessage { .. })
        )
    };
}

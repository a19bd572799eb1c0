//! 외부 협력 서비스.

pub mod completion;

pub use completion::{
    system_prompt, ChatMessage, ChatRole, CompletionError, CompletionProvider, OpenAiCompletion,
};

pub mod error_shapes;
pub mod mapping;
pub mod openai_chat;
pub mod upstream;

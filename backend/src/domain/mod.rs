pub mod coaching;
pub mod instructions;

pub use coaching::{
    compose_user_message, ChatMessage, ChatRole, CoachingInput, CoachingRequest,
    CoachingResponse, CoachingType, ConversationTurn,
};
pub use instructions::{compose_system_instruction, resolve_instructions, CoachingInstructions};

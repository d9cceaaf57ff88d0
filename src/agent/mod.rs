pub mod llm;
pub mod loop_;
pub mod prompt;
pub mod traits;

pub use llm::LlmWeatherAgent;
pub use loop_::{ChatService, TurnOutcome, TurnRequest, TurnState};
pub use traits::{AgentReply, AgentRequest, WeatherAgent};

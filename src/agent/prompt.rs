use super::traits::AgentRequest;
use crate::providers::ChatMessage;

pub const SYSTEM_PROMPT: &str = "You are a professional weather assistant that knows where the user is. \
When the user says 'today', 'here' or 'my location', answer for the location given in the message. \
Give accurate, practical weather information with safety advice where it matters: driving \
conditions, outdoor plans and health. Keep answers short but useful.";

/// Suffix the user's text with the resolved city, e.g. `"Is it cold? (Location: Oslo)"`.
pub fn with_location_hint(query: &str, city: Option<&str>) -> String {
    match city.map(str::trim).filter(|c| !c.is_empty()) {
        Some(city) => format!("{query} (Location: {city})"),
        None => query.to_string(),
    }
}

/// Assemble the provider conversation for one turn.
///
/// The stored copy of the current user message is replaced by `request.query`
/// so the location hint reaches the model without being persisted.
pub fn build_messages(request: &AgentRequest) -> Vec<ChatMessage> {
    let mut system = SYSTEM_PROMPT.to_string();
    let live: Vec<String> = request
        .weather
        .iter()
        .map(|w| w.render())
        .chain(request.air_quality.iter().map(|a| a.render()))
        .collect();
    if !live.is_empty() {
        system.push_str("\n\nLive data for this turn:\n");
        system.push_str(&live.join("\n\n"));
    }

    let mut messages = Vec::with_capacity(request.history.len() + 1);
    messages.push(ChatMessage::system(system));

    let prior = request.history.len().saturating_sub(1);
    messages.extend(request.history[..prior].iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(request.query.clone()));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::{Message, Role};
    use chrono::Utc;

    fn msg(role: Role, content: &str) -> Message {
        Message {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn location_hint_is_appended() {
        assert_eq!(
            with_location_hint("Do I need an umbrella?", Some("Paris")),
            "Do I need an umbrella? (Location: Paris)"
        );
        assert_eq!(with_location_hint("Hi", Some("  ")), "Hi");
        assert_eq!(with_location_hint("Hi", None), "Hi");
    }

    #[test]
    fn current_turn_uses_hinted_query() {
        let request = AgentRequest {
            history: vec![
                msg(Role::User, "Weather in Rome?"),
                msg(Role::Assistant, "Sunny."),
                msg(Role::User, "And tomorrow?"),
            ],
            query: "And tomorrow? (Location: Rome)".into(),
            city: Some("Rome".into()),
            weather: None,
            air_quality: None,
        };

        let messages = build_messages(&request);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1], ChatMessage::user("Weather in Rome?"));
        assert_eq!(messages[2], ChatMessage::assistant("Sunny."));
        assert_eq!(messages[3], ChatMessage::user("And tomorrow? (Location: Rome)"));
    }

    #[test]
    fn air_quality_reaches_system_prompt() {
        use crate::weather::{AirQualityReport, Pollutants};

        let request = AgentRequest {
            history: vec![msg(Role::User, "Can I go running?")],
            query: "Can I go running? (Location: Delhi)".into(),
            city: Some("Delhi".into()),
            weather: None,
            air_quality: Some(AirQualityReport::from_pollutants(
                "Delhi",
                Pollutants {
                    pm2_5: Some(80.0),
                    ..Pollutants::default()
                },
            )),
        };
        let messages = build_messages(&request);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("Live data for this turn:"));
        assert!(messages[0].content.contains("Air quality in Delhi: AQI"));
    }

    #[test]
    fn empty_history_still_sends_query() {
        let request = AgentRequest {
            history: Vec::new(),
            query: "hello".into(),
            city: None,
            weather: None,
            air_quality: None,
        };
        let messages = build_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "hello");
    }
}

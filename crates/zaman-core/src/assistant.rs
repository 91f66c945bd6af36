//! Goal-planning conversation
//!
//! Walks a user through discovery, clarification, recommendation,
//! confirmation and a final call to action. The model drives the wording;
//! stage transitions are decided here from the fields it extracts.

use std::collections::HashMap;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ai::parsing::parse_stage_reply;
use crate::ai::{AIBackend, AIClient, ChatMessage, Role, StageReply};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{ChatGoal, ChatSession, ChatStage};
use crate::planning::{CREDITS, DEPOSITS, ISLAMIC};
use crate::prompts::{PromptId, PromptLibrary};

/// Stored turns sent back to the model
pub const HISTORY_LIMIT: i64 = 20;

/// Length of generated session ids
pub const SESSION_ID_LEN: usize = 32;

const CHAT_TEMPERATURE: f32 = 0.7;

const AFFIRMATIVE: [&str; 6] = ["да", "yes", "ок", "ok", "подтверждаю", "confirm"];
const NEGATIVE: [&str; 4] = ["нет", "no", "отмена", "cancel"];

/// Answer to one user message
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
    pub stage: ChatStage,
    pub goal: ChatGoal,
}

/// New random session id
pub fn generate_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

/// Stage change implied by a plain yes/no answer during confirmation
fn confirmation_transition(message: &str) -> Option<ChatStage> {
    let answer = message.trim().to_lowercase();
    if AFFIRMATIVE.contains(&answer.as_str()) {
        Some(ChatStage::Cta)
    } else if NEGATIVE.contains(&answer.as_str()) {
        Some(ChatStage::Recommendation)
    } else {
        None
    }
}

/// Copy every field the model filled in and refresh the monthly saving
pub fn merge_goal(goal: &mut ChatGoal, reply: &StageReply) {
    if let Some(goal_type) = reply.goal_type.as_ref().filter(|g| !g.trim().is_empty()) {
        goal.goal_type = Some(goal_type.trim().to_string());
    }
    if let Some(cost) = reply.goal_cost {
        goal.goal_cost = Some(cost);
    }
    if let Some(timeline) = reply.timeline {
        goal.timeline = Some(timeline);
    }
    if let Some(products) = reply.products.as_ref().filter(|p| !p.is_empty()) {
        goal.products = Some(products.clone());
    }

    goal.monthly_saving = match (goal.goal_cost, goal.timeline) {
        (Some(cost), Some(months)) if months > 0 => Some(cost / months as f64),
        _ => None,
    };
}

/// Whether the fields a stage collects are all known
fn stage_requirements_met(stage: ChatStage, goal: &ChatGoal) -> bool {
    match stage {
        ChatStage::Discovery => goal.goal_type.is_some(),
        ChatStage::Clarification => {
            goal.goal_cost.is_some() && goal.timeline.is_some_and(|months| months > 0)
        }
        ChatStage::Recommendation => goal.products.is_some(),
        // Only an explicit yes/no leaves confirmation
        ChatStage::Confirmation | ChatStage::Cta => false,
    }
}

/// Next stage after a model turn
pub fn advance_stage(stage: ChatStage, stage_complete: bool, goal: &ChatGoal) -> ChatStage {
    if stage_complete && stage_requirements_met(stage, goal) {
        stage.next().unwrap_or(stage)
    } else {
        stage
    }
}

fn format_amount(value: Option<f64>) -> String {
    value.map(|v| format!("{:.0}", v)).unwrap_or_default()
}

/// Product list for the recommendation prompt
fn catalog_text() -> String {
    DEPOSITS
        .iter()
        .chain(CREDITS.iter())
        .chain(ISLAMIC.iter())
        .map(|p| {
            let terms: Vec<&str> = [p.rate, p.term, p.kind].into_iter().flatten().collect();
            if terms.is_empty() {
                format!("- {}: {}", p.name, p.description)
            } else {
                format!("- {} ({}): {}", p.name, terms.join(", "), p.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn stage_vars(goal: &ChatGoal) -> HashMap<&'static str, String> {
    let mut vars = HashMap::new();
    vars.insert("goal_type", goal.goal_type.clone().unwrap_or_default());
    vars.insert("goal_cost", format_amount(goal.goal_cost));
    vars.insert(
        "timeline",
        goal.timeline.map(|t| t.to_string()).unwrap_or_default(),
    );
    vars.insert("monthly_saving", format_amount(goal.monthly_saving));
    vars.insert(
        "products",
        goal.products.as_ref().map(|p| p.join(", ")).unwrap_or_default(),
    );
    vars.insert("catalog", catalog_text());
    vars
}

/// Drives a user's goal conversation
pub struct Assistant<'a> {
    db: &'a Database,
    ai: &'a AIClient,
    prompts: &'a PromptLibrary,
}

impl<'a> Assistant<'a> {
    pub fn new(db: &'a Database, ai: &'a AIClient, prompts: &'a PromptLibrary) -> Self {
        Self { db, ai, prompts }
    }

    /// System prompt for a session: persona plus current stage instructions
    pub fn system_prompt(&self, stage: ChatStage, goal: &ChatGoal) -> Result<String> {
        let persona = self.prompts.get(PromptId::Assistant)?;
        let stage_prompt = self.prompts.get(PromptId::for_stage(stage))?;
        let vars = stage_vars(goal);
        Ok(format!(
            "{}\n\n{}",
            persona.render(&vars),
            stage_prompt.render(&vars)
        ))
    }

    fn history(&self, session: &ChatSession) -> Result<Vec<ChatMessage>> {
        Ok(self
            .db
            .recent_chat_messages(session.id, HISTORY_LIMIT)?
            .into_iter()
            .filter_map(|record| {
                let role = record.role.parse::<Role>().ok()?;
                Some(ChatMessage {
                    role,
                    content: record.content,
                })
            })
            .collect())
    }

    /// Handle one user message and return the assistant's answer
    pub async fn handle_message(
        &self,
        user_id: i64,
        session_id: Option<&str>,
        message: &str,
    ) -> Result<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::InvalidData("Message must not be empty".to_string()));
        }

        let session_id = match session_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => id.to_string(),
            None => generate_session_id(),
        };

        let mut session = self.db.get_or_create_chat_session(user_id, &session_id)?;

        if session.stage == ChatStage::Confirmation {
            if let Some(next) = confirmation_transition(message) {
                info!(session = %session_id, from = %session.stage, to = %next, "Confirmation answered");
                session.stage = next;
            }
        }

        let mut messages = vec![ChatMessage::system(
            self.system_prompt(session.stage, &session.goal)?,
        )];
        messages.extend(self.history(&session)?);
        messages.push(ChatMessage::user(message));

        let raw = self.ai.chat(&messages, CHAT_TEMPERATURE).await?;

        let response = match parse_stage_reply(&raw) {
            Ok(reply) => {
                merge_goal(&mut session.goal, &reply);
                let next = advance_stage(session.stage, reply.stage_complete, &session.goal);
                if next != session.stage {
                    info!(session = %session_id, from = %session.stage, to = %next, "Stage advanced");
                    session.stage = next;
                }
                if reply.reply.trim().is_empty() {
                    raw.trim().to_string()
                } else {
                    reply.reply
                }
            }
            Err(e) => {
                warn!(session = %session_id, error = %e, "Unstructured AI reply, using it verbatim");
                raw.trim().to_string()
            }
        };

        self.db
            .append_chat_message(session.id, Role::User.as_str(), message)?;
        self.db
            .append_chat_message(session.id, Role::Assistant.as_str(), &response)?;
        self.db.save_chat_session(&session)?;

        debug!(session = %session_id, stage = %session.stage, "Chat turn stored");

        Ok(ChatReply {
            response,
            session_id,
            stage: session.stage,
            goal: session.goal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;

    fn setup() -> (Database, i64) {
        let db = Database::in_memory().unwrap();
        let user = db
            .create_user("aida", "aida@example.com", "hash", 0.0)
            .unwrap();
        (db, user.id)
    }

    #[test]
    fn test_generate_session_id() {
        let id = generate_session_id();
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, generate_session_id());
    }

    #[test]
    fn test_confirmation_words() {
        assert_eq!(confirmation_transition(" Да "), Some(ChatStage::Cta));
        assert_eq!(confirmation_transition("OK"), Some(ChatStage::Cta));
        assert_eq!(
            confirmation_transition("Отмена"),
            Some(ChatStage::Recommendation)
        );
        assert_eq!(confirmation_transition("да, но позже"), None);
    }

    #[test]
    fn test_merge_goal_overwrites_and_derives_saving() {
        let mut goal = ChatGoal {
            goal_type: Some("car".into()),
            ..Default::default()
        };
        let reply = StageReply {
            goal_type: Some("apartment".into()),
            goal_cost: Some(12_000_000.0),
            timeline: Some(24),
            ..Default::default()
        };
        merge_goal(&mut goal, &reply);
        assert_eq!(goal.goal_type.as_deref(), Some("apartment"));
        assert_eq!(goal.monthly_saving, Some(500_000.0));

        // Missing fields keep what was collected
        merge_goal(&mut goal, &StageReply::default());
        assert_eq!(goal.goal_cost, Some(12_000_000.0));
    }

    #[test]
    fn test_zero_timeline_has_no_saving() {
        let mut goal = ChatGoal::default();
        merge_goal(
            &mut goal,
            &StageReply {
                goal_cost: Some(100.0),
                timeline: Some(0),
                ..Default::default()
            },
        );
        assert_eq!(goal.monthly_saving, None);
    }

    #[test]
    fn test_saving_cleared_when_timeline_becomes_invalid() {
        let mut goal = ChatGoal::default();
        merge_goal(
            &mut goal,
            &StageReply {
                goal_cost: Some(1200.0),
                timeline: Some(12),
                ..Default::default()
            },
        );
        assert_eq!(goal.monthly_saving, Some(100.0));

        merge_goal(
            &mut goal,
            &StageReply {
                goal_cost: Some(6000.0),
                timeline: Some(0),
                ..Default::default()
            },
        );
        assert_eq!(goal.goal_cost, Some(6000.0));
        assert_eq!(goal.timeline, Some(0));
        assert_eq!(goal.monthly_saving, None);
    }

    #[test]
    fn test_clarification_needs_positive_timeline() {
        let mut goal = ChatGoal {
            goal_type: Some("car".into()),
            goal_cost: Some(5_000_000.0),
            timeline: Some(-3),
            ..Default::default()
        };
        assert_eq!(
            advance_stage(ChatStage::Clarification, true, &goal),
            ChatStage::Clarification
        );

        goal.timeline = Some(0);
        assert_eq!(
            advance_stage(ChatStage::Clarification, true, &goal),
            ChatStage::Clarification
        );

        goal.timeline = Some(10);
        assert_eq!(
            advance_stage(ChatStage::Clarification, true, &goal),
            ChatStage::Recommendation
        );
    }

    #[test]
    fn test_advance_requires_fields() {
        let empty = ChatGoal::default();
        assert_eq!(
            advance_stage(ChatStage::Discovery, true, &empty),
            ChatStage::Discovery
        );

        let typed = ChatGoal {
            goal_type: Some("education".into()),
            ..Default::default()
        };
        assert_eq!(
            advance_stage(ChatStage::Discovery, true, &typed),
            ChatStage::Clarification
        );
        assert_eq!(
            advance_stage(ChatStage::Discovery, false, &typed),
            ChatStage::Discovery
        );
        assert_eq!(
            advance_stage(ChatStage::Clarification, true, &typed),
            ChatStage::Clarification
        );

        let full = ChatGoal {
            goal_type: Some("education".into()),
            goal_cost: Some(1.0),
            timeline: Some(1),
            monthly_saving: Some(1.0),
            products: Some(vec!["Мурабаха".into()]),
        };
        assert_eq!(
            advance_stage(ChatStage::Recommendation, true, &full),
            ChatStage::Confirmation
        );
        assert_eq!(
            advance_stage(ChatStage::Confirmation, true, &full),
            ChatStage::Confirmation
        );
        assert_eq!(advance_stage(ChatStage::Cta, true, &full), ChatStage::Cta);
    }

    #[test]
    fn test_system_prompt_renders_goal() {
        let (db, _) = setup();
        let ai = AIClient::mock();
        let prompts = PromptLibrary::embedded_only();
        let assistant = Assistant::new(&db, &ai, &prompts);

        let goal = ChatGoal {
            goal_type: Some("apartment".into()),
            goal_cost: Some(30_000_000.0),
            timeline: Some(60),
            monthly_saving: Some(500_000.0),
            products: None,
        };
        let prompt = assistant
            .system_prompt(ChatStage::Recommendation, &goal)
            .unwrap();
        assert!(prompt.starts_with("Ты - AI-ассистент банка Zaman"));
        assert!(prompt.contains("стоимость 30000000"));
        assert!(prompt.contains("500000 в месяц"));
        assert!(prompt.contains("Ипотечный кредит (11.5%, 240 месяцев)"));
        assert!(!prompt.contains("{{"));
    }

    #[tokio::test]
    async fn test_full_conversation() {
        let (db, user_id) = setup();
        let mock = MockBackend::with_replies([
            r#"{"reply": "Отлично, квартира! Сколько она стоит?", "stage_complete": true, "goal_type": "apartment"}"#,
            r#"{"reply": "Понял.", "stage_complete": true, "goal_cost": "24 000 000", "timeline": 48}"#,
            r#"{"reply": "Советую ипотеку. Подтверждаете?", "stage_complete": true, "products": ["Ипотечный кредит"]}"#,
            r#"{"reply": "Отлично, оформим заявку!", "stage_complete": true}"#,
        ]);
        let ai = AIClient::Mock(mock.clone());
        let prompts = PromptLibrary::embedded_only();
        let assistant = Assistant::new(&db, &ai, &prompts);

        let first = assistant
            .handle_message(user_id, None, "Хочу квартиру")
            .await
            .unwrap();
        assert_eq!(first.stage, ChatStage::Clarification);
        assert_eq!(first.response, "Отлично, квартира! Сколько она стоит?");
        let sid = first.session_id.clone();
        assert_eq!(sid.len(), SESSION_ID_LEN);

        let second = assistant
            .handle_message(user_id, Some(&sid), "24 миллиона за 4 года")
            .await
            .unwrap();
        assert_eq!(second.stage, ChatStage::Recommendation);
        assert_eq!(second.goal.monthly_saving, Some(500_000.0));

        let third = assistant
            .handle_message(user_id, Some(&sid), "Что посоветуете?")
            .await
            .unwrap();
        assert_eq!(third.stage, ChatStage::Confirmation);

        let fourth = assistant
            .handle_message(user_id, Some(&sid), "Да")
            .await
            .unwrap();
        assert_eq!(fourth.stage, ChatStage::Cta);
        assert_eq!(fourth.goal.products, Some(vec!["Ипотечный кредит".to_string()]));

        // The last request carried prior turns and the cta instructions
        let requests = mock.requests();
        let last = requests.last().unwrap();
        assert_eq!(last[0].role, Role::System);
        assert_eq!(last.len(), 1 + 6 + 1);
        assert_eq!(last.last().unwrap().content, "Да");

        let stored = db.get_chat_session(user_id, &sid).unwrap().unwrap();
        assert_eq!(stored.stage, ChatStage::Cta);
        assert_eq!(db.recent_chat_messages(stored.id, 100).unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_confirmation_declined_returns_to_recommendation() {
        let (db, user_id) = setup();
        let ai = AIClient::Mock(MockBackend::with_replies([
            r#"{"reply": "Давайте подберём другое.", "stage_complete": false}"#,
        ]));
        let prompts = PromptLibrary::embedded_only();

        let mut session = db.get_or_create_chat_session(user_id, "s1").unwrap();
        session.stage = ChatStage::Confirmation;
        db.save_chat_session(&session).unwrap();

        let reply = Assistant::new(&db, &ai, &prompts)
            .handle_message(user_id, Some("s1"), "нет")
            .await
            .unwrap();
        assert_eq!(reply.stage, ChatStage::Recommendation);
    }

    #[tokio::test]
    async fn test_unstructured_reply_used_verbatim() {
        let (db, user_id) = setup();
        let ai = AIClient::Mock(MockBackend::with_replies(["  Просто текст  "]));
        let prompts = PromptLibrary::embedded_only();

        let reply = Assistant::new(&db, &ai, &prompts)
            .handle_message(user_id, Some("plain"), "Привет")
            .await
            .unwrap();
        assert_eq!(reply.response, "Просто текст");
        assert_eq!(reply.stage, ChatStage::Discovery);
        assert_eq!(reply.goal, ChatGoal::default());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (db, user_id) = setup();
        let ai = AIClient::mock();
        let prompts = PromptLibrary::embedded_only();

        let err = Assistant::new(&db, &ai, &prompts)
            .handle_message(user_id, None, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_ai_failure_stores_nothing() {
        let (db, user_id) = setup();
        let ai = AIClient::Mock(MockBackend::failing());
        let prompts = PromptLibrary::embedded_only();

        let err = Assistant::new(&db, &ai, &prompts)
            .handle_message(user_id, Some("s2"), "Привет")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Ai(_)));

        let session = db.get_chat_session(user_id, "s2").unwrap().unwrap();
        assert!(db.recent_chat_messages(session.id, 10).unwrap().is_empty());
    }
}

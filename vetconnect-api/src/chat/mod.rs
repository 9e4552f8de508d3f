/// Booking assistant
///
/// A rule-driven chat that answers clinic questions, screens symptoms and
/// walks the user through booking an appointment. Each message passes through
/// the same pipeline:
///
/// 1. per-session cooldown
/// 2. input sanitization
/// 3. safety layer (emergency keywords, always first, resets any booking)
/// 4. the booking state machine when a booking is in progress
/// 5. otherwise intent routing: booking, hours, services, cancel/reschedule
///    guidance, symptom screening, wildlife, then the assistant fallback
///
/// Sessions live in memory and are keyed by a client-held session id.

pub mod booking;
pub mod datetime;
pub mod knowledge;
pub mod llm;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::ChatConfig;
use booking::{BookingData, BookingSession, Turn};
use knowledge::{contains_phrase, mentions_any, AnimalMatch};
use llm::{Assistant, OpenAiAssistant};
use vetconnect_shared::validation::sanitize_text;

/// Sessions idle longer than this are dropped
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

/// Hard cap on live sessions; the oldest are evicted beyond it
const MAX_SESSIONS: usize = 10_000;

/// Minimum gap between idle-session scans
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

const MAX_SESSION_ID_LEN: usize = 64;

/// Longest accepted chat message, in characters
pub const MAX_MESSAGE_LEN: usize = 1000;

const BOOKING_KEYWORDS: [&str; 12] = [
    "book",
    "appointment",
    "schedule",
    "magpa-check",
    "gusto",
    "punta",
    "yes",
    "oo",
    "sige",
    "sure",
    "i want to",
    "gusto ko",
];

const HOURS_KEYWORDS: [&str; 5] = ["hour", "open", "close", "oras", "bukas"];

const SERVICE_KEYWORDS: [&str; 6] = ["service", "offer", "serbisyo", "magkano", "price", "cost"];

const MANAGE_KEYWORDS: [&str; 4] = ["cancel", "reschedule", "move", "change appointment"];

const SYMPTOM_KEYWORDS: [&str; 22] = [
    "check symptom",
    "symptoms",
    "my pet is",
    "my dog is",
    "my cat is",
    "not eating",
    "sick",
    "ayaw kumain",
    "matamlay",
    "may sakit",
    "nagsusuka",
    "vomit",
    "diarrhea",
    "limp",
    "lethargy",
    "wound",
    "rash",
    "coughing",
    "sneezing",
    "scratch",
    "laging tulog",
    "hindi kumakain",
];

const BARE_SYMPTOM_REQUESTS: [&str; 4] = ["check symptom", "check symptoms", "symptoms", "symptom"];

const HOURS_REPLY: &str = "🕐 Clinic Hours:\nMonday - Saturday: 7:00 AM - 8:00 PM\nSunday: Closed\n\nAppointments outside these hours cannot be booked.";

const SERVICES_REPLY: &str = "🏥 We offer the following services:\n\n• Consultation: bring medical records\n• Vaccination: anti-rabies, 5-in-1, Parvo\n• Spay & Neuter: fasting required (8-12 hrs)\n• Deworming: every 2 weeks for puppies\n• Grooming: inform us if your pet is aggressive\n\nWould you like to book an appointment?";

const MANAGE_REPLY: &str = "To cancel or reschedule, open the My Appointments tab in the sidebar and select the appointment you'd like to change.";

const SYMPTOM_PROMPT_REPLY: &str = "Sure! Please describe your pet's symptoms and I'll help assess them.\n\nFor example: 'My dog has been vomiting for 2 days' or 'My cat is not eating and seems lethargic.'";

const BOOK_FOLLOW_UP: &str = "\n\nWould you like to book a consultation? Just say 'yes' or 'book an appointment' and I'll get you started. 🐾";

pub const EMPTY_MESSAGE_REPLY: &str = "Please type a message.";

/// Response body of `POST /api/chat`
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_data: Option<BookingData>,
}

#[derive(Debug, Clone, Default)]
struct ChatSession {
    booking: BookingSession,
    last_message: Option<Instant>,
    last_seen: Option<Instant>,

    /// Creation order, matched against `SessionStore::order`
    seq: u64,
}

/// Session map bounded to [`MAX_SESSIONS`]
///
/// `order` lists sessions oldest first. Entries whose session was removed
/// or replaced are skipped on eviction and compacted away once the queue
/// grows past twice the cap.
#[derive(Debug, Default)]
struct SessionStore {
    sessions: HashMap<String, ChatSession>,
    order: VecDeque<(String, u64)>,
    next_seq: u64,
    last_pruned: Option<Instant>,
}

impl SessionStore {
    fn len(&self) -> usize {
        self.sessions.len()
    }

    #[cfg(test)]
    fn get(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.get(id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut ChatSession> {
        self.sessions.get_mut(id)
    }

    #[cfg(test)]
    fn contains_key(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    fn remove(&mut self, id: &str) {
        self.sessions.remove(id);
    }

    /// Session for `id`, created if missing
    fn touch(&mut self, id: &str, at: Instant) -> &mut ChatSession {
        let is_new = !self.sessions.contains_key(id);
        if is_new {
            self.make_room(at);
        }

        let seq = self.next_seq;
        let session = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| ChatSession {
                seq,
                ..Default::default()
            });
        if is_new {
            self.next_seq += 1;
            self.order.push_back((id.to_string(), seq));
        }
        session.last_seen = Some(at);
        session
    }

    fn is_live(sessions: &HashMap<String, ChatSession>, id: &str, seq: u64) -> bool {
        sessions.get(id).is_some_and(|s| s.seq == seq)
    }

    /// Frees one slot when the store is full
    fn make_room(&mut self, at: Instant) {
        if self.order.len() > MAX_SESSIONS * 2 {
            let sessions = &self.sessions;
            self.order
                .retain(|(id, seq)| Self::is_live(sessions, id, *seq));
        }

        if self.sessions.len() < MAX_SESSIONS {
            return;
        }

        let prune_due = self
            .last_pruned
            .map_or(true, |last| at.saturating_duration_since(last) >= PRUNE_INTERVAL);
        if prune_due {
            self.last_pruned = Some(at);
            self.sessions.retain(|_, s| {
                s.last_seen
                    .map(|seen| at.saturating_duration_since(seen) < SESSION_IDLE_TTL)
                    .unwrap_or(false)
            });
        }

        while self.sessions.len() >= MAX_SESSIONS {
            let Some((id, seq)) = self.order.pop_front() else {
                break;
            };
            if Self::is_live(&self.sessions, &id, seq) {
                self.sessions.remove(&id);
            }
        }
    }
}

/// Chat sessions and the optional language-model backend
pub struct ChatService {
    sessions: Mutex<SessionStore>,
    assistant: Option<Arc<dyn Assistant>>,
    cooldown: Duration,
}

impl ChatService {
    pub fn new(cooldown: Duration, assistant: Option<Arc<dyn Assistant>>) -> Self {
        Self {
            sessions: Mutex::new(SessionStore::default()),
            assistant,
            cooldown,
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        let assistant = config.llm.clone().map(|llm| {
            tracing::info!(url = %llm.url, model = %llm.model, "Chat assistant backend configured");
            Arc::new(OpenAiAssistant::new(llm)) as Arc<dyn Assistant>
        });
        if assistant.is_none() {
            tracing::info!("CHAT_LLM_URL not set, chat assistant runs on built-in rules only");
        }

        Self::new(Duration::from_secs(config.cooldown_secs), assistant)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionStore> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    /// Starts a fresh session, discarding `previous` if given
    pub fn reset(&self, previous: Option<&str>) -> String {
        let session_id = Uuid::new_v4().to_string();
        let mut sessions = self.lock();
        if let Some(previous) = previous {
            sessions.remove(previous);
        }
        sessions.touch(&session_id, Instant::now());
        session_id
    }

    /// Handles one message using the clinic's local time
    pub async fn respond(&self, session_id: Option<String>, message: &str) -> ChatReply {
        self.respond_at(session_id, message, Instant::now(), Local::now().naive_local())
            .await
    }

    pub async fn respond_at(
        &self,
        session_id: Option<String>,
        message: &str,
        at: Instant,
        now: NaiveDateTime,
    ) -> ChatReply {
        let session_id = session_id
            .filter(|id| !id.is_empty() && id.len() <= MAX_SESSION_ID_LEN)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // Cooldown is checked and stamped under the lock; the booking state is
        // copied out so no lock is held across assistant calls.
        let mut booking = {
            let mut sessions = self.lock();
            let session = sessions.touch(&session_id, at);

            if let Some(last) = session.last_message {
                let elapsed = at.saturating_duration_since(last);
                if elapsed < self.cooldown {
                    let remaining = (self.cooldown - elapsed).as_secs_f64();
                    return ChatReply {
                        reply: format!("⏳ Please wait {:.1}s before sending another message.", remaining),
                        session_id,
                        booking_data: None,
                    };
                }
            }
            session.last_message = Some(at);
            session.booking.clone()
        };

        let (reply, booking_data) = self.process(&mut booking, message, now).await;

        if let Some(session) = self.lock().get_mut(&session_id) {
            session.booking = booking;
        }

        ChatReply {
            reply,
            session_id,
            booking_data,
        }
    }

    async fn process(
        &self,
        session: &mut BookingSession,
        message: &str,
        now: NaiveDateTime,
    ) -> (String, Option<BookingData>) {
        let raw = sanitize_text(message);
        if raw.is_empty() {
            return (EMPTY_MESSAGE_REPLY.to_string(), None);
        }

        if let Some(emergency) = knowledge::check_safety(&raw) {
            tracing::warn!(stage = ?session.stage, "Emergency keywords detected in chat message");
            session.reset();
            return (emergency.to_string(), None);
        }

        let assistant = self.assistant.as_deref();

        if session.stage.is_active() {
            return match booking::handle(session, &raw, assistant, now).await {
                Turn::Reply(reply) => (reply, None),
                Turn::Booked { reply, booking } => {
                    tracing::info!(service = %booking.service, date = %booking.date, "Chat booking confirmed");
                    (reply, Some(booking))
                }
            };
        }

        (self.route_idle(session, &raw).await, None)
    }

    async fn route_idle(&self, session: &mut BookingSession, raw: &str) -> String {
        let lower = raw.to_lowercase();
        let assistant = self.assistant.as_deref();

        if BOOKING_KEYWORDS.iter().any(|k| contains_phrase(&lower, k)) {
            session.start();
            return booking::BOOKING_INTRO.to_string();
        }

        if mentions_any(&lower, &HOURS_KEYWORDS) {
            return HOURS_REPLY.to_string();
        }

        if mentions_any(&lower, &SERVICE_KEYWORDS) {
            return SERVICES_REPLY.to_string();
        }

        if mentions_any(&lower, &MANAGE_KEYWORDS) {
            return MANAGE_REPLY.to_string();
        }

        if mentions_any(&lower, &SYMPTOM_KEYWORDS) {
            if BARE_SYMPTOM_REQUESTS.contains(&lower.trim()) {
                return SYMPTOM_PROMPT_REPLY.to_string();
            }

            let animal = match knowledge::find_animal(raw) {
                Some(AnimalMatch::Supported(animal)) => Some(animal),
                _ => None,
            };
            let advice = booking::symptom_advice(assistant, raw, animal).await;
            return format!("{advice}{BOOK_FOLLOW_UP}");
        }

        if let Some(AnimalMatch::Wildlife(animal)) = knowledge::find_animal(raw) {
            return format!(
                "🦁 We're a domestic and farm animal clinic, we don't handle {animal}s. \
                 Please contact a wildlife rescue center or zoo veterinarian."
            );
        }

        match assistant {
            Some(assistant) => assistant.advise(raw).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Assistant fallback failed, using offline reply");
                llm::OFFLINE_REPLY.to_string()
            }),
            None => llm::OFFLINE_REPLY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booking::Stage;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn service() -> ChatService {
        ChatService::new(Duration::from_secs(3), None)
    }

    /// Sends messages four seconds apart so the cooldown never applies
    async fn converse(chat: &ChatService, messages: &[&str]) -> Vec<ChatReply> {
        let start = Instant::now();
        let mut session_id = None;
        let mut replies = Vec::new();
        for (i, message) in messages.iter().enumerate() {
            let at = start + Duration::from_secs(4 * i as u64);
            let reply = chat.respond_at(session_id.clone(), message, at, now()).await;
            session_id = Some(reply.session_id.clone());
            replies.push(reply);
        }
        replies
    }

    #[tokio::test]
    async fn test_new_session_id_is_issued() {
        let chat = service();
        let reply = chat.respond(None, "what are your hours?").await;
        assert!(Uuid::parse_str(&reply.session_id).is_ok());
        assert_eq!(reply.reply, HOURS_REPLY);
    }

    #[tokio::test]
    async fn test_cooldown() {
        let chat = service();
        let at = Instant::now();

        let first = chat.respond_at(None, "hello", at, now()).await;
        let second = chat
            .respond_at(Some(first.session_id.clone()), "hello again", at + Duration::from_secs(1), now())
            .await;
        assert!(second.reply.starts_with("⏳ Please wait 2.0s"));

        let third = chat
            .respond_at(Some(first.session_id), "services?", at + Duration::from_secs(3), now())
            .await;
        assert_eq!(third.reply, SERVICES_REPLY);
    }

    #[tokio::test]
    async fn test_empty_message() {
        let chat = service();
        let reply = chat.respond(None, "  <b></b> ").await;
        assert_eq!(reply.reply, EMPTY_MESSAGE_REPLY);
    }

    #[tokio::test]
    async fn test_emergency_resets_booking() {
        let chat = service();
        let replies = converse(&chat, &["I want to book", "consultation", "my dog is bleeding"]).await;

        assert_eq!(replies[0].reply, booking::BOOKING_INTRO);
        assert_eq!(replies[2].reply, knowledge::EMERGENCY_REPLY);

        let id = &replies[2].session_id;
        let sessions = chat.lock();
        assert_eq!(sessions.get(id).unwrap().booking.stage, Stage::Idle);
    }

    #[tokio::test]
    async fn test_booking_through_service() {
        let chat = service();
        let replies = converse(
            &chat,
            &[
                "book an appointment",
                "spay",
                "cat",
                "puspin",
                "her name is Mingming",
                "03/20/2026 3:30 PM",
                "confirm",
            ],
        )
        .await;

        let last = replies.last().unwrap();
        let booking = last.booking_data.as_ref().expect("booking data on confirmation");
        assert_eq!(booking.service, "Spay & Neuter");
        assert_eq!(booking.species, "Cat (Puspin)");
        assert_eq!(booking.pet_name, "Mingming");
        assert_eq!(booking.time, "15:30");

        let body = serde_json::to_value(last).unwrap();
        assert_eq!(body["booking_data"]["appointmentStatus"], "pending");
        assert_eq!(body["booking_data"]["status"], "upcoming");
        assert!(replies[..6].iter().all(|r| r.booking_data.is_none()));
    }

    #[tokio::test]
    async fn test_idle_intents() {
        let chat = service();
        let replies = converse(
            &chat,
            &["how do I reschedule?", "check symptoms", "a wolf bit my hand", "hello there"],
        )
        .await;

        assert_eq!(replies[0].reply, MANAGE_REPLY);
        assert_eq!(replies[1].reply, SYMPTOM_PROMPT_REPLY);
        assert!(replies[2].reply.contains("don't handle Wolfs"));
        assert_eq!(replies[3].reply, llm::OFFLINE_REPLY);
    }

    #[tokio::test]
    async fn test_symptom_screening_offers_booking() {
        let chat = service();
        let reply = chat.respond(None, "my dog is vomiting").await;
        assert!(reply.reply.starts_with(llm::OFFLINE_REPLY));
        assert!(reply.reply.ends_with(BOOK_FOLLOW_UP));
    }

    #[tokio::test]
    async fn test_reset_replaces_session() {
        let chat = service();
        let first = chat.respond(None, "hours").await;
        let fresh = chat.reset(Some(&first.session_id));

        assert_ne!(fresh, first.session_id);
        let sessions = chat.lock();
        assert!(!sessions.contains_key(&first.session_id));
        assert!(sessions.contains_key(&fresh));
    }

    #[tokio::test]
    async fn test_session_count_stays_under_cap() {
        let chat = ChatService::new(Duration::ZERO, None);
        let at = Instant::now();

        let first = chat.respond_at(None, "hours", at, now()).await;
        for _ in 0..MAX_SESSIONS + 500 {
            chat.respond_at(None, "hours", at, now()).await;
        }
        for _ in 0..500 {
            chat.reset(None);
        }

        assert_eq!(chat.session_count(), MAX_SESSIONS);
        assert!(!chat.lock().contains_key(&first.session_id), "oldest session is evicted first");
    }

    #[test]
    fn test_replaced_sessions_do_not_grow_the_queue() {
        let chat = service();
        let mut id = chat.reset(None);
        for _ in 0..MAX_SESSIONS * 3 {
            id = chat.reset(Some(&id));
        }

        let store = chat.lock();
        assert_eq!(store.len(), 1);
        assert!(store.order.len() <= MAX_SESSIONS * 2 + 1);
    }

    #[tokio::test]
    async fn test_overlong_session_id_replaced() {
        let chat = service();
        let reply = chat.respond(Some("x".repeat(200)), "hours").await;
        assert_eq!(reply.session_id.len(), 36);
    }
}

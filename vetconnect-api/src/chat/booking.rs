/// Guided booking conversation
///
/// ```text
/// AskService → AskAnimal → AskBreed → AskPetName → AskDateTime → Confirm → Done
/// ```
///
/// At every stage before `Confirm` an exit phrase abandons the booking. FAQ
/// questions and symptom asides are answered and the current question is
/// repeated. Corrections ("actually it's a cat", "no wait, her name is Luna")
/// rewind to the stage that depends on the corrected value.

use chrono::{NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

use super::datetime::{self, DATETIME_EXAMPLE};
use super::knowledge::{self, contains_phrase, mentions_any, AnimalMatch};
use super::llm::{self, Assistant};
use vetconnect_shared::models::appointment::{
    AppointmentStatus, ScheduleStatus, UNASSIGNED_VET,
};

const EXIT_PHRASES: [&str; 9] = [
    "cancel",
    "stop",
    "exit",
    "quit",
    "nevermind",
    "never mind",
    "start over",
    "ulit",
    "basta",
];

const HOURS_KEYWORDS: [&str; 6] = ["clinic hour", "anong oras", "open", "bukas", "close", "sarado"];

const PRICE_KEYWORDS: [&str; 5] = ["how much", "magkano", "price", "cost", "presyo"];

const ASIDE_KEYWORDS: [&str; 31] = [
    "scratching",
    "vomit",
    "diarrhea",
    "not eating",
    "ayaw kumain",
    "sick",
    "matamlay",
    "may sakit",
    "nagsusuka",
    "lethargic",
    "lethargy",
    "coughing",
    "sneezing",
    "wound",
    "rash",
    "hindi kumakain",
    "laging tulog",
    "itchy",
    "swollen",
    "limping",
    "hiccup",
    "shaking",
    "trembling",
    "nagtatae",
    "btw",
    "by the way",
    "actually my",
    "also my",
    "my dog has",
    "my cat has",
    "my pet has",
];

const CORRECTION_TRIGGERS: [&str; 14] = [
    "pala",
    "actually",
    "mali",
    "correction",
    "i meant",
    "i mean",
    "not a",
    "not my",
    "i made a mistake",
    "no wait",
    "oh wait",
    "pakipalitan",
    "ibig sabihin",
    "baguhin",
];

pub const BOOKING_INTRO: &str = "I'd be happy to help you book an appointment! 🐾\n\nWhat service do you need?\n\n• Consultation\n• Vaccination\n• Spay & Neuter\n• Deworming\n• Grooming";

pub const BOOKING_CANCELLED: &str = "No problem! Booking cancelled. How else can I help you? 🐾";

const DATETIME_PROMPT: &str = "When would you like to schedule the appointment?\nFormat: MM/DD/YYYY HH:MM AM/PM (e.g. 03/20/2026 10:00 AM)\n\nOur clinic is open Mon-Sat, 7:00 AM - 8:00 PM.";

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:name is|named|call (?:him|her|it|them)|'s name is|siya si|pangalan)\s+([A-Za-z][A-Za-z\-']*)")
        .expect("valid name regex")
});

static NAME_CORRECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:correct name is|the name is|name is|named|call (?:him|her|it|them)|'s name is|siya si|pangalan|palitan|yung name(?:\s+is)?|it'?s(?:\s+actually)?|its(?:\s+actually)?)\s+([A-Za-z][A-Za-z\-']*)",
    )
    .expect("valid name correction regex")
});

static CORRECTION_FILLER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:oh wait|no wait|pala|actually|mali|correction|i meant|i mean|pakipalitan|ibig sabihin|baguhin|it'?s|its|the name is|wait)\b|[,']",
    )
    .expect("valid filler regex")
});

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\-']+$").expect("valid word regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Idle,
    AskService,
    AskAnimal,
    AskBreed,
    AskPetName,
    AskDateTime,
    Confirm,
    Done,
}

impl Stage {
    /// True while a booking is in progress
    pub fn is_active(&self) -> bool {
        !matches!(self, Stage::Idle | Stage::Done)
    }

    /// The question to repeat after an interruption
    pub fn resume_prompt(&self, draft: &BookingDraft) -> String {
        match self {
            Stage::AskService => "what service do you need? (Consultation, Vaccination, Spay & Neuter, Deworming, Grooming)".to_string(),
            Stage::AskAnimal => "what type of animal is your pet?".to_string(),
            Stage::AskBreed => format!(
                "what breed is your {}?",
                draft.animal.map(str::to_lowercase).unwrap_or_else(|| "pet".to_string())
            ),
            Stage::AskPetName => "what's your pet's name?".to_string(),
            Stage::AskDateTime => format!("what date and time works for you? (e.g. {})", DATETIME_EXAMPLE),
            Stage::Confirm => "please type 'confirm' to finalize or 'cancel' to start over.".to_string(),
            Stage::Idle | Stage::Done => "how can I help you?".to_string(),
        }
    }
}

/// Answers collected so far
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingDraft {
    pub service: Option<&'static str>,
    pub animal: Option<&'static str>,
    pub breed: Option<String>,
    pub pet_name: Option<String>,
    pub slot: Option<NaiveDateTime>,
}

impl BookingDraft {
    pub fn is_empty(&self) -> bool {
        *self == BookingDraft::default()
    }

    fn summary(&self) -> String {
        format!(
            "• Service:   {}\n• Animal:    {} ({})\n• Pet Name:  {}\n• Date/Time: {}",
            self.service.unwrap_or("-"),
            self.animal.unwrap_or("-"),
            self.breed.as_deref().unwrap_or("Unknown"),
            self.pet_name.as_deref().unwrap_or("-"),
            self.slot.map(datetime::format_slot).unwrap_or_else(|| "-".to_string()),
        )
    }
}

/// Conversation state for one chat session
#[derive(Debug, Clone, Default)]
pub struct BookingSession {
    pub stage: Stage,
    pub draft: BookingDraft,
}

impl BookingSession {
    pub fn start(&mut self) {
        self.stage = Stage::AskService;
        self.draft = BookingDraft::default();
    }

    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.draft = BookingDraft::default();
    }
}

/// Confirmed booking handed back to the client, which submits it to
/// `POST /api/appointments`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingData {
    pub pet_name: String,

    /// `Animal (Breed)`
    pub species: String,
    pub service: String,

    /// As shown to the user, `MM/DD/YYYY HH:MM AM/PM`
    pub datetime: String,

    /// `YYYY-MM-DD`
    pub date: String,

    /// `HH:MM`
    pub time: String,
    pub status: ScheduleStatus,
    pub appointment_status: AppointmentStatus,
    pub assigned_vet: String,
    pub transaction_hash: String,
}

/// Result of one booking turn
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    Reply(String),
    Booked { reply: String, booking: BookingData },
}

impl Turn {
    fn reply(text: impl Into<String>) -> Self {
        Turn::Reply(text.into())
    }
}

/// `0x` + SHA-256 over the booking fields and the confirmation time
pub fn receipt_hash(booking: &BookingData, confirmed_at: i64) -> String {
    let mut payload = serde_json::to_value(booking).unwrap_or_default();
    if let Some(map) = payload.as_object_mut() {
        map.remove("transactionHash");
        map.insert("_timestamp".to_string(), confirmed_at.into());
    }

    let digest = Sha256::digest(payload.to_string().as_bytes());
    format!("0x{}", hex::encode(digest))
}

async fn instruct(assistant: Option<&dyn Assistant>, prompt: &str) -> Option<String> {
    let assistant = assistant?;
    match assistant.instruct(prompt).await {
        Ok(answer) => Some(answer),
        Err(e) => {
            tracing::warn!(error = %e, "Assistant instruction failed");
            None
        }
    }
}

/// Entity extraction through the assistant, `None` when nothing usable came back
async fn extract(
    assistant: Option<&dyn Assistant>,
    raw: &str,
    entity: &str,
    exclude: Option<&str>,
) -> Option<String> {
    let answer = instruct(assistant, &llm::extraction_prompt(raw, entity, exclude)).await?;
    let cleaned = llm::clean_extracted(&answer);
    (!llm::is_empty_answer(&cleaned)).then(|| knowledge::title_case(&cleaned))
}

/// Whitelist first, then a yes/no question to the assistant
async fn is_known_breed(assistant: Option<&dyn Assistant>, breed: &str, animal: &str) -> bool {
    if knowledge::is_universal_breed(breed) || knowledge::match_breed(animal, breed).is_some() {
        return true;
    }
    instruct(assistant, &llm::breed_check_prompt(breed, animal))
        .await
        .map(|answer| answer.trim().trim_end_matches('.').eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

/// Advice for a symptom description, offline text when the assistant is unavailable
pub async fn symptom_advice(assistant: Option<&dyn Assistant>, raw: &str, animal: Option<&str>) -> String {
    let Some(assistant) = assistant else {
        return llm::OFFLINE_REPLY.to_string();
    };

    let subject = animal.unwrap_or("pet");
    let prompt = format!(
        "The user has a {subject}. They say: '{raw}'. Give a 2-3 sentence professional veterinary \
         response about these symptoms in a {subject}. Do NOT mention any other animal species. \
         End with 'Only a licensed veterinarian can confirm the exact cause.'"
    );

    match assistant.advise(&prompt).await {
        Ok(advice) => advice,
        Err(e) => {
            tracing::warn!(error = %e, "Symptom advice failed, using offline reply");
            llm::OFFLINE_REPLY.to_string()
        }
    }
}

fn simple_name(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw.split_whitespace().collect();
    ((1..=3).contains(&words.len()) && words.iter().all(|w| WORD_RE.is_match(w)))
        .then(|| knowledge::title_case(raw))
}

fn name_updated(name: &str) -> String {
    format!("Got it, name updated to {name}! 🐾\n\n{DATETIME_PROMPT}")
}

/// Advances the booking by one user message
///
/// `raw` is the sanitized message and `now` the clinic's local time.
pub async fn handle(
    session: &mut BookingSession,
    raw: &str,
    assistant: Option<&dyn Assistant>,
    now: NaiveDateTime,
) -> Turn {
    let lower = raw.to_lowercase();
    let stage = session.stage;

    if stage != Stage::Confirm && EXIT_PHRASES.iter().any(|p| contains_phrase(&lower, p)) {
        session.reset();
        return Turn::reply(BOOKING_CANCELLED);
    }

    if mentions_any(&lower, &HOURS_KEYWORDS) {
        return Turn::reply(format!(
            "🕐 We're open Mon-Sat: 7:00 AM - 8:00 PM. Sunday: Closed.\n\nNow back to your booking, {}",
            stage.resume_prompt(&session.draft)
        ));
    }

    if mentions_any(&lower, &PRICE_KEYWORDS) {
        return Turn::reply(format!(
            "💰 Pricing varies per procedure. The vet will confirm the exact rate during your visit.\n\nNow back to your booking, {}",
            stage.resume_prompt(&session.draft)
        ));
    }

    let is_direct_answer = lower.contains("confirm")
        || lower.contains("cancel")
        || datetime::contains_date(raw)
        || matches!(stage, Stage::AskBreed | Stage::AskPetName)
        || (stage == Stage::AskService && knowledge::match_service(raw).is_some());

    if mentions_any(&lower, &ASIDE_KEYWORDS) && !is_direct_answer {
        let advice = symptom_advice(assistant, raw, session.draft.animal).await;
        return Turn::reply(format!(
            "I noticed a health concern, let me address that first! 🩺\n\n{advice}\n\n━━━━━━━━━━━━━━━━━━━━\nNow, back to your booking, {}",
            stage.resume_prompt(&session.draft)
        ));
    }

    if stage != Stage::AskService
        && !session.draft.is_empty()
        && mentions_any(&lower, &CORRECTION_TRIGGERS)
    {
        if let Some(turn) = handle_correction(session, raw, assistant, now).await {
            return turn;
        }
    }

    match stage {
        Stage::AskService => ask_service(session, raw, assistant).await,
        Stage::AskAnimal => ask_animal(session, raw, assistant).await,
        Stage::AskBreed => ask_breed(session, raw, assistant).await,
        Stage::AskPetName => ask_pet_name(session, raw, assistant).await,
        Stage::AskDateTime => ask_datetime(session, raw, now),
        Stage::Confirm => confirm(session, &lower),
        Stage::Idle | Stage::Done => {
            session.reset();
            Turn::reply("How can I help you?")
        }
    }
}

async fn handle_correction(
    session: &mut BookingSession,
    raw: &str,
    assistant: Option<&dyn Assistant>,
    now: NaiveDateTime,
) -> Option<Turn> {
    let stage = session.stage;
    let draft = &mut session.draft;
    let past_pet_name = matches!(stage, Stage::AskPetName | Stage::AskDateTime | Stage::Confirm);

    if let Some(service) = knowledge::match_service(raw) {
        *draft = BookingDraft {
            service: Some(service),
            ..BookingDraft::default()
        };
        session.stage = Stage::AskAnimal;
        return Some(Turn::reply(format!(
            "No worries! Service updated to {service}.\n\nWhat type of animal is your pet? (e.g. Dog, Cat, Rabbit, Bird, Horse)"
        )));
    }

    if stage != Stage::AskAnimal {
        match knowledge::find_animal(raw) {
            Some(AnimalMatch::Wildlife(animal)) => {
                session.reset();
                return Some(Turn::reply(format!(
                    "🦁 Sorry, we don't handle {animal}s. Please contact a wildlife rescue center."
                )));
            }
            Some(AnimalMatch::Supported(animal)) => {
                draft.animal = Some(animal);
                draft.breed = None;
                draft.pet_name = None;
                draft.slot = None;
                session.stage = Stage::AskBreed;
                return Some(Turn::reply(format!(
                    "Updated! So it's a {animal}.\n\nWhat breed is your {}? (Type 'unknown' if not sure)",
                    animal.to_lowercase()
                )));
            }
            None => {}
        }
    }

    if past_pet_name {
        if let Some(animal) = draft.animal {
            let candidate = match knowledge::match_breed(animal, raw) {
                Some(breed) => Some(knowledge::title_case(breed)),
                None => extract(assistant, raw, "breed", draft.pet_name.as_deref()).await,
            };

            if let Some(breed) = candidate {
                if is_known_breed(assistant, &breed, animal).await {
                    draft.breed = Some(breed.clone());
                    draft.slot = None;
                    return Some(match draft.pet_name.clone() {
                        Some(name) => {
                            session.stage = Stage::AskDateTime;
                            Turn::reply(format!(
                                "Breed corrected to {breed}! 🐾\n\nKeeping the name as {name}. {DATETIME_PROMPT}"
                            ))
                        }
                        None => {
                            session.stage = Stage::AskPetName;
                            Turn::reply(format!("Breed corrected to {breed}! 🐾\n\nWhat's your pet's name?"))
                        }
                    });
                }
            }
        }

        let corrected_name = NAME_CORRECTION_RE
            .captures(raw)
            .map(|caps| knowledge::title_case(&caps[1]))
            .or_else(|| {
                let stripped = CORRECTION_FILLER_RE.replace_all(raw, " ");
                let words: Vec<&str> = stripped
                    .split_whitespace()
                    .filter(|w| WORD_RE.is_match(w))
                    .collect();
                (words.len() == 1).then(|| knowledge::title_case(words[0]))
            });

        if let Some(name) = corrected_name {
            draft.pet_name = Some(name.clone());
            draft.slot = None;
            session.stage = Stage::AskDateTime;
            return Some(Turn::reply(name_updated(&name)));
        }
    }

    if stage == Stage::Confirm {
        if let Ok(slot) = datetime::parse_slot(raw, now) {
            draft.slot = Some(slot);
            return Some(Turn::reply(format!(
                "Schedule updated! Here's your revised appointment:\n\n{}\n\nType 'confirm' to book, or 'cancel' to start over.",
                draft.summary()
            )));
        }
    }

    None
}

async fn ask_service(session: &mut BookingSession, raw: &str, assistant: Option<&dyn Assistant>) -> Turn {
    let service = match knowledge::match_service(raw) {
        Some(service) => Some(service),
        None => {
            let prompt = format!(
                "Extract the vet service from this text: '{raw}'. Choose ONE from: {}. Return ONLY the service name.",
                knowledge::SERVICES.join(", ")
            );
            instruct(assistant, &prompt)
                .await
                .and_then(|answer| knowledge::canonical_service(&answer))
        }
    };

    let Some(service) = service else {
        return Turn::reply(
            "I didn't catch that. Please choose one of:\nConsultation, Vaccination, Spay & Neuter, Deworming, or Grooming.",
        );
    };

    session.draft.service = Some(service);
    session.stage = Stage::AskAnimal;
    Turn::reply(format!(
        "Got it, {service}! 🐾\n\nWhat type of animal is your pet?\n(e.g. Dog, Cat, Rabbit, Bird, Horse)"
    ))
}

async fn ask_animal(session: &mut BookingSession, raw: &str, assistant: Option<&dyn Assistant>) -> Turn {
    let (found, extracted) = match knowledge::find_animal(raw) {
        Some(found) => (Some(found), None),
        None => {
            let extracted = extract(assistant, raw, "animal species", None).await;
            (extracted.as_deref().and_then(knowledge::find_animal), extracted)
        }
    };

    match found {
        Some(AnimalMatch::Wildlife(animal)) => {
            session.reset();
            Turn::reply(format!(
                "🦁 Sorry, we don't handle {animal}s. We only treat domestic and farm animals. Please contact a wildlife rescue center."
            ))
        }
        Some(AnimalMatch::Supported(animal)) => {
            session.draft.animal = Some(animal);
            session.stage = Stage::AskBreed;
            Turn::reply(format!(
                "A {animal}, got it! 🐾\n\nWhat breed is your {}? (Type 'unknown' if not sure)",
                animal.to_lowercase()
            ))
        }
        None => match extracted {
            Some(other) => Turn::reply(format!(
                "We don't currently serve {other}s. We accept: Dogs, Cats, Rabbits, Hamsters, Turtles, Birds, \
                 Cows, Hens, Pigs, Goats, Sheep, Horses, Ducks, Buffalos, Cattle, Donkeys, and Mules.\n\n\
                 What type of animal is your pet?"
            )),
            None => Turn::reply(
                "I didn't catch the animal type. Could you tell me what kind of pet it is? (e.g. Dog, Cat, Bird)",
            ),
        },
    }
}

async fn ask_breed(session: &mut BookingSession, raw: &str, assistant: Option<&dyn Assistant>) -> Turn {
    let animal = session.draft.animal.unwrap_or("Dog");

    if knowledge::is_universal_breed(raw) {
        session.draft.breed = Some("Unknown".to_string());
        session.stage = Stage::AskPetName;
        return Turn::reply("No problem! What's your pet's name?");
    }

    if let Some(breed) = knowledge::match_breed(animal, raw) {
        let breed = knowledge::title_case(breed);
        session.draft.breed = Some(breed.clone());
        session.stage = Stage::AskPetName;
        return Turn::reply(format!("{breed}, lovely! 🐾\n\nWhat's your pet's name?"));
    }

    let candidate = match assistant {
        Some(_) => extract(assistant, raw, "breed", session.draft.pet_name.as_deref()).await,
        None => simple_name(raw),
    };

    let Some(breed) = candidate else {
        return Turn::reply(format!(
            "I didn't catch a breed name. What breed is your {}? (Type 'unknown' or 'mixed' if you're not sure)",
            animal.to_lowercase()
        ));
    };

    if !is_known_breed(assistant, &breed, animal).await {
        return Turn::reply(format!(
            "'{breed}' doesn't seem to be a {animal} breed. Could you double-check? (Or type 'unknown' / 'mixed')"
        ));
    }

    session.draft.breed = Some(breed.clone());
    session.stage = Stage::AskPetName;
    Turn::reply(format!("{breed}, lovely! 🐾\n\nWhat's your pet's name?"))
}

async fn ask_pet_name(session: &mut BookingSession, raw: &str, assistant: Option<&dyn Assistant>) -> Turn {
    let name = match NAME_RE.captures(raw) {
        Some(caps) => Some(knowledge::title_case(&caps[1])),
        None => match simple_name(raw) {
            Some(name) => Some(name),
            None => extract(assistant, raw, "pet name", None).await,
        },
    };

    let Some(name) = name else {
        return Turn::reply("What should I call your pet? Please enter their name.");
    };

    session.draft.pet_name = Some(name.clone());
    session.stage = Stage::AskDateTime;
    Turn::reply(format!("Nice to meet {name}! 🐾\n\n{DATETIME_PROMPT}"))
}

fn ask_datetime(session: &mut BookingSession, raw: &str, now: NaiveDateTime) -> Turn {
    match datetime::parse_slot(raw, now) {
        Ok(slot) => {
            session.draft.slot = Some(slot);
            session.stage = Stage::Confirm;
            Turn::reply(format!(
                "Almost done! Please confirm your appointment:\n\n{}\n\nType 'confirm' to book, or 'cancel' to start over.",
                session.draft.summary()
            ))
        }
        Err(e) => Turn::reply(format!(
            "⚠️ {e}\n\nPlease re-enter the date and time (e.g. {DATETIME_EXAMPLE})."
        )),
    }
}

fn confirm(session: &mut BookingSession, lower: &str) -> Turn {
    if lower.contains("confirm") {
        let draft = std::mem::take(&mut session.draft);
        let Some(slot) = draft.slot else {
            session.stage = Stage::AskDateTime;
            return Turn::reply(DATETIME_PROMPT);
        };

        let mut booking = BookingData {
            pet_name: draft.pet_name.unwrap_or_default(),
            species: format!(
                "{} ({})",
                draft.animal.unwrap_or_default(),
                draft.breed.as_deref().unwrap_or("Unknown")
            ),
            service: draft.service.unwrap_or_default().to_string(),
            datetime: datetime::format_slot(slot),
            date: slot.date().format("%Y-%m-%d").to_string(),
            time: slot.time().format("%H:%M").to_string(),
            status: ScheduleStatus::Upcoming,
            appointment_status: AppointmentStatus::Pending,
            assigned_vet: UNASSIGNED_VET.to_string(),
            transaction_hash: String::new(),
        };
        booking.transaction_hash = receipt_hash(&booking, Utc::now().timestamp_nanos_opt().unwrap_or_default());

        session.stage = Stage::Done;
        let reply = format!(
            "✅ Appointment booked successfully!\n\nYour request has been submitted and is pending confirmation. \
             You'll receive a notification once a vet is assigned.\n\n🔗 Receipt hash:\n{}\n\n\
             You can view your appointment in the My Appointments tab.",
            booking.transaction_hash
        );
        return Turn::Booked { reply, booking };
    }

    if lower.contains("cancel") {
        session.reset();
        return Turn::reply("Booking cancelled. Feel free to start a new conversation anytime! 🐾");
    }

    Turn::reply("Please type 'confirm' to book your appointment, or 'cancel' to start over.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::llm::AssistantError;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn started() -> BookingSession {
        let mut session = BookingSession::default();
        session.start();
        session
    }

    async fn say(session: &mut BookingSession, text: &str) -> String {
        match handle(session, text, None, now()).await {
            Turn::Reply(reply) => reply,
            Turn::Booked { reply, .. } => reply,
        }
    }

    /// Extracts a fixed breed and gives a fixed verdict on it
    struct BreedAssistant {
        extracted: &'static str,
        verdict: &'static str,
    }

    #[async_trait]
    impl Assistant for BreedAssistant {
        async fn advise(&self, _prompt: &str) -> Result<String, AssistantError> {
            Ok(String::new())
        }

        async fn instruct(&self, prompt: &str) -> Result<String, AssistantError> {
            let answer = if prompt.contains("breed validator") {
                self.verdict
            } else {
                self.extracted
            };
            Ok(answer.to_string())
        }
    }

    #[tokio::test]
    async fn test_full_booking_flow() {
        let mut session = started();

        say(&mut session, "vaccination please").await;
        assert_eq!(session.stage, Stage::AskAnimal);

        say(&mut session, "a dog").await;
        assert_eq!(session.draft.animal, Some("Dog"));

        say(&mut session, "aspin").await;
        assert_eq!(session.draft.breed.as_deref(), Some("Aspin"));

        say(&mut session, "Coco").await;
        assert_eq!(session.stage, Stage::AskDateTime);

        let reply = say(&mut session, "03/20/2026 10:00 AM").await;
        assert_eq!(session.stage, Stage::Confirm);
        assert!(reply.contains("• Pet Name:  Coco"));

        let turn = handle(&mut session, "confirm", None, now()).await;
        let Turn::Booked { booking, reply } = turn else {
            panic!("expected a booking");
        };
        assert_eq!(booking.pet_name, "Coco");
        assert_eq!(booking.species, "Dog (Aspin)");
        assert_eq!(booking.service, "Vaccination");
        assert_eq!(booking.date, "2026-03-20");
        assert_eq!(booking.time, "10:00");
        assert_eq!(booking.assigned_vet, UNASSIGNED_VET);
        assert!(booking.transaction_hash.starts_with("0x"));
        assert_eq!(booking.transaction_hash.len(), 66);
        assert!(reply.contains(&booking.transaction_hash));
        assert_eq!(session.stage, Stage::Done);
        assert!(session.draft.is_empty());
    }

    #[tokio::test]
    async fn test_exit_phrase_cancels_before_confirm() {
        let mut session = started();
        say(&mut session, "grooming").await;

        assert_eq!(say(&mut session, "never mind").await, BOOKING_CANCELLED);
        assert_eq!(session.stage, Stage::Idle);
    }

    #[tokio::test]
    async fn test_unknown_service_reprompts() {
        let mut session = started();
        let reply = say(&mut session, "something fancy").await;
        assert!(reply.starts_with("I didn't catch that"));
        assert_eq!(session.stage, Stage::AskService);
    }

    #[tokio::test]
    async fn test_wildlife_ends_booking() {
        let mut session = started();
        say(&mut session, "consultation").await;

        let reply = say(&mut session, "my pet tiger").await;
        assert!(reply.contains("don't handle Tigers"));
        assert_eq!(session.stage, Stage::Idle);
    }

    #[tokio::test]
    async fn test_hours_question_resumes_stage() {
        let mut session = started();
        say(&mut session, "deworming").await;

        let reply = say(&mut session, "what time are you open?").await;
        assert!(reply.contains("7:00 AM - 8:00 PM"));
        assert!(reply.ends_with("what type of animal is your pet?"));
        assert_eq!(session.stage, Stage::AskAnimal);
    }

    #[tokio::test]
    async fn test_symptom_aside_without_assistant() {
        let mut session = started();
        say(&mut session, "consultation").await;
        say(&mut session, "cat").await;

        // breed stage expects an answer, so the aside is only detected later
        say(&mut session, "persian").await;
        say(&mut session, "Mochi").await;

        let reply = say(&mut session, "by the way she keeps sneezing").await;
        assert!(reply.contains(llm::OFFLINE_REPLY));
        assert!(reply.contains("back to your booking"));
        assert_eq!(session.stage, Stage::AskDateTime);
    }

    #[tokio::test]
    async fn test_animal_correction_rewinds_to_breed() {
        let mut session = started();
        say(&mut session, "consultation").await;
        say(&mut session, "dog").await;
        say(&mut session, "beagle").await;

        let reply = say(&mut session, "oh wait, it's actually a cat").await;
        assert!(reply.starts_with("Updated! So it's a Cat."));
        assert_eq!(session.stage, Stage::AskBreed);
        assert_eq!(session.draft.breed, None);
    }

    #[tokio::test]
    async fn test_name_correction_keeps_earlier_answers() {
        let mut session = started();
        say(&mut session, "grooming").await;
        say(&mut session, "dog").await;
        say(&mut session, "poodle").await;
        say(&mut session, "Max").await;

        let reply = say(&mut session, "no wait, the name is Bruno").await;
        assert!(reply.contains("name updated to Bruno"));
        assert_eq!(session.draft.pet_name.as_deref(), Some("Bruno"));
        assert_eq!(session.draft.breed.as_deref(), Some("Poodle"));
        assert_eq!(session.stage, Stage::AskDateTime);
    }

    #[tokio::test]
    async fn test_invalid_datetime_reprompts() {
        let mut session = started();
        say(&mut session, "consultation").await;
        say(&mut session, "rabbit").await;
        say(&mut session, "unknown").await;
        say(&mut session, "Bun").await;

        let reply = say(&mut session, "03/20/2026 9:00 PM").await;
        assert!(reply.contains("clinic is closed"));
        assert_eq!(session.stage, Stage::AskDateTime);
    }

    #[tokio::test]
    async fn test_confirm_stage_cancel() {
        let mut session = started();
        for msg in ["consultation", "dog", "mixed", "Rex", "03/20/2026 10:00 AM"] {
            say(&mut session, msg).await;
        }
        assert_eq!(session.stage, Stage::Confirm);

        let reply = say(&mut session, "cancel").await;
        assert!(reply.starts_with("Booking cancelled."));
        assert_eq!(session.stage, Stage::Idle);
    }

    #[tokio::test]
    async fn test_unlisted_breed_without_assistant_is_rejected() {
        let mut session = started();
        say(&mut session, "consultation").await;
        say(&mut session, "dog").await;

        let reply = say(&mut session, "Kintamani").await;
        assert!(reply.contains("doesn't seem to be a Dog breed"));
        assert_eq!(session.stage, Stage::AskBreed);
    }

    #[tokio::test]
    async fn test_unlisted_breed_accepted_by_assistant() {
        let mut session = started();
        say(&mut session, "consultation").await;
        say(&mut session, "dog").await;

        let assistant = BreedAssistant {
            extracted: "kintamani",
            verdict: "Yes.",
        };
        let reply = match handle(&mut session, "kintamani", Some(&assistant), now()).await {
            Turn::Reply(reply) => reply,
            Turn::Booked { .. } => panic!("breed answer must not book"),
        };
        assert_eq!(session.stage, Stage::AskPetName);
        assert_eq!(session.draft.breed.as_deref(), Some("Kintamani"));
        assert!(reply.starts_with("Kintamani, lovely!"));
    }

    #[tokio::test]
    async fn test_breed_rejected_by_assistant_is_not_stored() {
        let mut session = started();
        say(&mut session, "consultation").await;
        say(&mut session, "dog").await;

        let assistant = BreedAssistant {
            extracted: "Siamese",
            verdict: "no",
        };
        let reply = match handle(&mut session, "Siamese", Some(&assistant), now()).await {
            Turn::Reply(reply) => reply,
            Turn::Booked { .. } => panic!("breed answer must not book"),
        };
        assert!(reply.contains("'Siamese' doesn't seem to be a Dog breed"));
        assert_eq!(session.stage, Stage::AskBreed);
        assert_eq!(session.draft.breed, None);
    }

    #[test]
    fn test_receipt_hash_depends_on_time() {
        let booking = BookingData {
            pet_name: "Coco".into(),
            species: "Dog (Aspin)".into(),
            service: "Vaccination".into(),
            datetime: "03/20/2026 10:00 AM".into(),
            date: "2026-03-20".into(),
            time: "10:00".into(),
            status: ScheduleStatus::Upcoming,
            appointment_status: AppointmentStatus::Pending,
            assigned_vet: UNASSIGNED_VET.into(),
            transaction_hash: String::new(),
        };

        let a = receipt_hash(&booking, 1);
        assert_eq!(a, receipt_hash(&booking, 1));
        assert_ne!(a, receipt_hash(&booking, 2));
    }
}

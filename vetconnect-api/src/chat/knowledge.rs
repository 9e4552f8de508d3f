/// Static clinic knowledge used by the booking assistant
///
/// Services, supported and wildlife animals, emergency keywords and the breed
/// whitelist. Matching is done on normalized text (lowercase, punctuation
/// folded to spaces) at word boundaries, so "cat" never matches "cattle".

pub const SERVICES: [&str; 5] = [
    "Consultation",
    "Vaccination",
    "Spay & Neuter",
    "Deworming",
    "Grooming",
];

/// Keyword to service, checked in order
const SERVICE_KEYWORDS: [(&str, &str); 13] = [
    ("consult", "Consultation"),
    ("checkup", "Consultation"),
    ("check-up", "Consultation"),
    ("vacc", "Vaccination"),
    ("bakuna", "Vaccination"),
    ("spay", "Spay & Neuter"),
    ("neuter", "Spay & Neuter"),
    ("kapon", "Spay & Neuter"),
    ("deworm", "Deworming"),
    ("purga", "Deworming"),
    ("groom", "Grooming"),
    ("ligo", "Grooming"),
    ("bath", "Grooming"),
];

pub const SUPPORTED_ANIMALS: [&str; 17] = [
    "Dog", "Cat", "Rabbit", "Hamster", "Turtle", "Bird", "Cow", "Hen", "Pig", "Goat", "Sheep",
    "Horse", "Duck", "Buffalo", "Cattle", "Donkey", "Mule",
];

pub const WILDLIFE_ANIMALS: [&str; 15] = [
    "Lion", "Tiger", "Wolf", "Fox", "Monkey", "Snake", "Elephant", "Deer", "Elk", "Reindeer",
    "Hyaena", "Bear", "Crocodile", "Leopard", "Cheetah",
];

/// Phrases that trigger the emergency override, English and Filipino
const DANGER_WORDS: [&str; 32] = [
    "blood",
    "bleeding",
    "hemorrhage",
    "seizure",
    "convulsion",
    "unconscious",
    "unresponsive",
    "collapse",
    "collapsed",
    "poison",
    "poisoned",
    "toxic",
    "chocolate",
    "xylitol",
    "can't breathe",
    "not breathing",
    "difficulty breathing",
    "pale gums",
    "blue gums",
    "broken bone",
    "fracture",
    "dugo",
    "nagdudugo",
    "lason",
    "nalason",
    "hindi humihinga",
    "hindi makahinga",
    "nanghihina",
    "nalaglag",
    "namatay",
    "dying",
    "die",
];

pub const EMERGENCY_REPLY: &str = "🚨 EMERGENCY ALERT: Critical symptoms detected. Do not wait, bring your pet to the clinic IMMEDIATELY or contact an emergency veterinarian right away. Time is critical for conditions involving bleeding, seizures, poisoning, or loss of consciousness.";

/// Breed answers accepted for every species
pub const UNIVERSAL_BREEDS: [&str; 12] = [
    "unknown",
    "mixed",
    "mix",
    "crossbreed",
    "mongrel",
    "native",
    "local",
    "local breed",
    "not sure",
    "di alam",
    "ayoko alam",
    "dunno",
];

/// A recognized animal mention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimalMatch {
    Supported(&'static str),
    Wildlife(&'static str),
}

impl AnimalMatch {
    pub fn name(&self) -> &'static str {
        match self {
            AnimalMatch::Supported(name) | AnimalMatch::Wildlife(name) => name,
        }
    }
}

/// Lowercases and folds everything except letters, digits and apostrophes
/// to single spaces
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whole-word phrase containment on normalized text
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    let needle = normalize(needle);
    if needle.is_empty() {
        return false;
    }
    format!(" {} ", normalize(haystack)).contains(&format!(" {} ", needle))
}

/// Substring containment of any keyword in already-lowercased text
pub fn mentions_any(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| lower.contains(k))
}

/// Inflections accepted after a single-word danger stem
const DANGER_SUFFIXES: [&str; 7] = ["", "s", "es", "d", "ed", "ing", "y"];

/// Emergency reply when the message mentions a critical symptom
///
/// Single words match with a small set of suffixes ("seizures", "bloody")
/// but not as part of another word ("bloodhound", "diet").
pub fn check_safety(text: &str) -> Option<&'static str> {
    let normalized = normalize(text);
    let words: Vec<&str> = normalized.split(' ').collect();

    let triggered = DANGER_WORDS.iter().any(|danger| {
        if danger.contains(' ') {
            contains_phrase(&normalized, danger)
        } else {
            words.iter().any(|w| {
                w.strip_prefix(*danger)
                    .is_some_and(|rest| DANGER_SUFFIXES.contains(&rest))
            })
        }
    });
    triggered.then_some(EMERGENCY_REPLY)
}

/// First service whose keyword appears in the text
pub fn match_service(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    SERVICE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, service)| *service)
        .or_else(|| SERVICES.iter().find(|s| contains_phrase(&lower, s)).copied())
}

/// Exact service name, case-insensitive
pub fn canonical_service(name: &str) -> Option<&'static str> {
    let name = name.trim().trim_matches(|c: char| c == '"' || c == '.');
    SERVICES.iter().find(|s| s.eq_ignore_ascii_case(name)).copied()
}

fn mentions_animal(words: &[&str], name: &str) -> bool {
    let name = name.to_lowercase();
    words.iter().any(|w| {
        *w == name
            || w.strip_suffix('s') == Some(name.as_str())
            || w.strip_suffix("es") == Some(name.as_str())
    })
}

/// First animal mentioned in the text, supported animals checked first
pub fn find_animal(text: &str) -> Option<AnimalMatch> {
    let normalized = normalize(text);
    let words: Vec<&str> = normalized.split(' ').collect();

    SUPPORTED_ANIMALS
        .iter()
        .find(|a| mentions_animal(&words, a))
        .map(|a| AnimalMatch::Supported(*a))
        .or_else(|| {
            WILDLIFE_ANIMALS
                .iter()
                .find(|a| mentions_animal(&words, a))
                .map(|a| AnimalMatch::Wildlife(*a))
        })
}

pub fn is_universal_breed(text: &str) -> bool {
    let normalized = normalize(text);
    UNIVERSAL_BREEDS.contains(&normalized.as_str())
}

/// Whitelisted breeds for a supported animal
pub fn breeds_for(animal: &str) -> &'static [&'static str] {
    match animal {
        "Dog" => &DOG_BREEDS,
        "Cat" => &CAT_BREEDS,
        "Rabbit" => &RABBIT_BREEDS,
        "Hamster" => &HAMSTER_BREEDS,
        "Turtle" => &TURTLE_BREEDS,
        "Bird" => &BIRD_BREEDS,
        "Cow" | "Cattle" => &CATTLE_BREEDS,
        "Hen" => &HEN_BREEDS,
        "Pig" => &PIG_BREEDS,
        "Goat" => &GOAT_BREEDS,
        "Sheep" => &SHEEP_BREEDS,
        "Horse" => &HORSE_BREEDS,
        "Duck" => &DUCK_BREEDS,
        "Buffalo" => &BUFFALO_BREEDS,
        "Donkey" => &DONKEY_BREEDS,
        "Mule" => &MULE_BREEDS,
        _ => &[],
    }
}

/// Whitelisted breed mentioned in the text
///
/// The longest breed contained in the text wins ("golden retriever" over
/// "golden"); otherwise a breed that contains the whole text ("retriever").
pub fn match_breed(animal: &str, text: &str) -> Option<&'static str> {
    let breeds = breeds_for(animal);

    let contained = breeds
        .iter()
        .filter(|b| contains_phrase(text, b))
        .max_by_key(|b| b.len())
        .copied();

    contained.or_else(|| {
        let normalized = normalize(text);
        if normalized.len() < 3 {
            return None;
        }
        breeds
            .iter()
            .find(|b| contains_phrase(b, &normalized))
            .copied()
    })
}

/// "golden retriever" → "Golden Retriever"
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

const DOG_BREEDS: [&str; 70] = [
    "aspin", "asong pinoy", "aso", "native dog", "philippine dog", "ph dog", "irong bisaya",
    "irong", "askal", "labrador", "lab", "golden retriever", "golden", "german shepherd", "gsd",
    "bulldog", "french bulldog", "frenchie", "poodle", "beagle", "rottweiler",
    "yorkshire terrier", "yorkie", "boxer", "dachshund", "siberian husky", "husky", "shih tzu",
    "chihuahua", "doberman", "great dane", "maltese", "pomeranian", "border collie",
    "australian shepherd", "australian cattle dog", "akita", "pitbull",
    "american pitbull terrier", "american bully", "bully", "jack russell", "cocker spaniel",
    "springer spaniel", "whippet", "basset hound", "bloodhound", "dalmatian", "samoyed",
    "chow chow", "shar pei", "schnauzer", "miniature schnauzer", "standard poodle",
    "miniature poodle", "toy poodle", "lhasa apso", "bichon frise", "papillon",
    "pembroke welsh corgi", "corgi", "alaskan malamute", "malamute", "vizsla", "weimaraner",
    "portuguese water dog", "native", "local breed", "mixed", "unknown",
];

const CAT_BREEDS: [&str; 37] = [
    "mixed", "unknown", "domestic shorthair", "domestic longhair", "tabby", "persian",
    "maine coon", "siamese", "ragdoll", "bengal", "sphynx", "british shorthair",
    "scottish fold", "abyssinian", "burmese", "russian blue", "norwegian forest cat",
    "turkish angora", "manx", "devon rex", "cornish rex", "oriental shorthair", "tonkinese",
    "balinese", "birman", "exotic shorthair", "himalayan", "savannah", "native", "local breed",
    "puspin", "pusang pinoy", "pusa", "philippine cat", "ph cat", "native cat", "lokal",
];

const RABBIT_BREEDS: [&str; 22] = [
    "mixed", "unknown", "holland lop", "mini lop", "french lop", "english lop",
    "flemish giant", "dutch", "mini rex", "rex", "lionhead", "angora", "english angora",
    "french angora", "new zealand", "californian", "chinchilla", "himalayan", "american",
    "beveren", "native", "local breed",
];

const HAMSTER_BREEDS: [&str; 10] = [
    "mixed", "unknown", "syrian", "golden", "dwarf", "roborovski", "campbell's dwarf",
    "winter white", "chinese hamster", "native",
];

const TURTLE_BREEDS: [&str; 14] = [
    "mixed", "unknown", "red eared slider", "box turtle", "painted turtle", "map turtle",
    "snapping turtle", "sulcata tortoise", "russian tortoise", "greek tortoise",
    "hermann's tortoise", "star tortoise", "native", "local breed",
];

const BIRD_BREEDS: [&str; 21] = [
    "mixed", "unknown", "parrot", "macaw", "cockatiel", "cockatoo", "budgerigar", "budgie",
    "lovebird", "african grey", "amazon parrot", "conure", "parakeet", "canary", "finch",
    "mynah", "myna", "pigeon", "dove", "native", "local breed",
];

const CATTLE_BREEDS: [&str; 14] = [
    "mixed", "unknown", "holstein", "jersey", "hereford", "angus", "brahman", "charolais",
    "simmental", "limousin", "shorthorn", "zebu", "native", "local breed",
];

const HEN_BREEDS: [&str; 22] = [
    "mixed", "unknown", "leghorn", "rhode island red", "plymouth rock", "barred rock",
    "buff orpington", "wyandotte", "australorp", "sussex", "brahma", "cochin", "silkie",
    "polish", "easter egger", "ameraucana", "araucana", "bantam", "native", "local breed",
    "broiler", "layer",
];

const PIG_BREEDS: [&str; 18] = [
    "mixed", "unknown", "landrace", "yorkshire", "duroc", "hampshire", "berkshire", "spotted",
    "chester white", "poland china", "large white", "pietrain", "vietnamese pot bellied",
    "pot bellied", "native", "local breed", "liempo", "bisaya",
];

const GOAT_BREEDS: [&str; 16] = [
    "mixed", "unknown", "boer", "nubian", "alpine", "saanen", "toggenburg", "lamancha",
    "angora", "pygmy", "nigerian dwarf", "kiko", "spanish", "cashmere", "native",
    "local breed",
];

const SHEEP_BREEDS: [&str; 17] = [
    "mixed", "unknown", "merino", "suffolk", "dorset", "romney", "corriedale",
    "border leicester", "lincoln", "rambouillet", "columbia", "cheviot", "jacob", "dorper",
    "katahdin", "native", "local breed",
];

const HORSE_BREEDS: [&str; 22] = [
    "mixed", "unknown", "thoroughbred", "quarter horse", "arabian", "appaloosa", "paint",
    "morgan", "andalusian", "warmblood", "friesian", "clydesdale", "shire", "percheron",
    "belgian", "shetland pony", "shetland", "welsh pony", "mustang", "standardbred", "native",
    "local breed",
];

const DUCK_BREEDS: [&str; 14] = [
    "mixed", "unknown", "pekin", "mallard", "muscovy", "rouen", "khaki campbell",
    "indian runner", "cayuga", "swedish", "buff", "native", "local breed", "pateros",
];

const BUFFALO_BREEDS: [&str; 12] = [
    "mixed", "unknown", "water buffalo", "carabao", "murrah", "nili ravi", "surti",
    "jaffarabadi", "bhadawari", "tarai", "native", "local breed",
];

const DONKEY_BREEDS: [&str; 9] = [
    "mixed", "unknown", "standard donkey", "miniature donkey", "mammoth jackstock", "poitou",
    "andalusian donkey", "native", "local breed",
];

const MULE_BREEDS: [&str; 6] = [
    "mixed", "unknown", "standard mule", "draft mule", "native", "local breed",
];

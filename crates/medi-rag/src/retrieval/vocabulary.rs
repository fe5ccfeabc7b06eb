//! Keyword gate for the drug registries.
//!
//! Drug label and adverse event lookups are slow and only useful for
//! clinical questions, so they are skipped unless the question mentions one
//! of these terms (French and English, matched as lowercase substrings).

const FRENCH_TERMS: &[&str] = &[
    "médicament", "medicament", "pillule", "comprimé", "traitement", "symptôme", "symptome",
    "maladie", "diagnostic", "effet secondaire", "dose", "posologie", "contre-indication",
    "interaction", "aspirin", "aspirine", "paracetamol", "ibuprofène", "ibuprofene", "vaccin",
    "cancer", "diabète", "diabete", "cardiaque", "foie", "rein", "poumon", "cerveau", "sang",
    "tension", "cholestérol", "allergie", "infection", "virus", "bactérie", "bacterie",
];

const ENGLISH_TERMS: &[&str] = &[
    "medication", "medicine", "drug", "pill", "tablet", "capsule", "treatment", "symptom",
    "disease", "diagnosis", "side effect", "adverse", "dosage", "contraindication",
    "prescription", "acetaminophen", "ibuprofen", "antibiotic", "insulin", "vaccine",
    "diabetes", "cardiac", "heart", "liver", "kidney", "lung", "blood", "hypertension",
    "cholesterol", "allergy", "asthma", "bacteria",
];

/// The built-in clinical vocabulary.
pub fn default_clinical_terms() -> Vec<String> {
    FRENCH_TERMS
        .iter()
        .chain(ENGLISH_TERMS)
        .map(|t| t.to_string())
        .collect()
}

/// True when `text` contains any vocabulary term, case-insensitively.
pub fn looks_clinical(text: &str, vocabulary: &[String]) -> bool {
    let lower = text.to_lowercase();
    vocabulary
        .iter()
        .any(|term| !term.is_empty() && lower.contains(&term.to_lowercase()))
}

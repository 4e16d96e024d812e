//! Built-in question bank used for seeding and in-memory runs.

use quiz_core::model::{Difficulty, Question, QuestionError, QuestionId};

type Row = (&'static str, [&'static str; 4], &'static str, &'static str, Difficulty);

const BANK: &[Row] = &[
    ("What is the chemical symbol for gold?", ["Au", "Ag", "Gd", "Go"], "Au", "Science", Difficulty::Easy),
    ("Which planet has the shortest orbit around the Sun?", ["Venus", "Mercury", "Mars", "Earth"], "Mercury", "Science", Difficulty::Easy),
    ("What is the SI unit of electrical resistance?", ["Volt", "Ampere", "Ohm", "Watt"], "Ohm", "Science", Difficulty::Medium),
    ("Which gas makes up most of Earth's atmosphere?", ["Oxygen", "Nitrogen", "Argon", "Carbon dioxide"], "Nitrogen", "Science", Difficulty::Medium),
    ("What particle carries a negative charge?", ["Proton", "Neutron", "Electron", "Photon"], "Electron", "Science", Difficulty::Easy),
    ("In which year did the Berlin Wall fall?", ["1987", "1989", "1991", "1993"], "1989", "History", Difficulty::Medium),
    ("Who was the first emperor of Rome?", ["Julius Caesar", "Nero", "Augustus", "Trajan"], "Augustus", "History", Difficulty::Medium),
    ("Which civilization built Machu Picchu?", ["Aztec", "Maya", "Inca", "Olmec"], "Inca", "History", Difficulty::Easy),
    ("The Magna Carta was sealed in which century?", ["11th", "12th", "13th", "14th"], "13th", "History", Difficulty::Hard),
    ("Which ship carried the Pilgrims to America in 1620?", ["Mayflower", "Santa Maria", "Endeavour", "Beagle"], "Mayflower", "History", Difficulty::Easy),
    ("What is the largest desert by area?", ["Sahara", "Gobi", "Antarctic", "Arabian"], "Antarctic", "Geography", Difficulty::Hard),
    ("Which river flows through Budapest?", ["Rhine", "Danube", "Vistula", "Elbe"], "Danube", "Geography", Difficulty::Medium),
    ("What is the capital of Canada?", ["Toronto", "Vancouver", "Ottawa", "Montreal"], "Ottawa", "Geography", Difficulty::Easy),
    ("Mount Kilimanjaro is located in which country?", ["Kenya", "Tanzania", "Uganda", "Ethiopia"], "Tanzania", "Geography", Difficulty::Medium),
    ("Which country has the most time zones?", ["Russia", "United States", "China", "France"], "France", "Geography", Difficulty::Hard),
];

/// Returns the sample bank with ids starting at 1.
///
/// # Errors
///
/// Returns `QuestionError` if a bundled row fails validation.
pub fn sample_questions() -> Result<Vec<Question>, QuestionError> {
    BANK.iter()
        .zip(1_u64..)
        .map(|((text, options, correct, category, difficulty), id)| {
            Question::new(
                QuestionId::new(id),
                *text,
                options.iter().map(|o| (*o).to_owned()).collect(),
                *correct,
                *category,
                *difficulty,
            )
        })
        .collect()
}

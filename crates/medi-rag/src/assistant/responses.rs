use crate::types::QuestionCategory;

pub const CRISIS_MESSAGE: &str = "It sounds like you may be going through something very difficult. \
I can't help with this here, but you don't have to face it alone. If you are in immediate danger, \
call your local emergency number now (112 in Europe, 15 in France, 911 in the US). In France you can \
also reach the suicide prevention line at 3114, any time of day.";

pub const REFUSAL_MESSAGE: &str = "I can't give a reliable answer to this question. It calls for \
clinical judgement about a specific situation, or I could not tell with enough confidence what \
is being asked. Please talk to a doctor or pharmacist, who can take your full situation into account.";

pub const INVALID_INPUT_MESSAGE: &str =
    "I couldn't understand the question. Please write it out in a full sentence.";

/// Shown when generation fails. Never includes the underlying error.
pub fn generation_error_message(question_type: &str) -> &'static str {
    match QuestionCategory::from_label(question_type) {
        Some(QuestionCategory::MultipleChoice) => {
            "I couldn't analyse this multiple choice question right now. \
             Please try again in a moment or rephrase it."
        }
        Some(QuestionCategory::Definition) => {
            "I'm unable to provide a definition at the moment. \
             A medical dictionary or textbook will cover this term."
        }
        Some(QuestionCategory::Reasoning) => {
            "I'm having difficulty analysing this case right now. \
             Consider consulting clinical guidelines or a healthcare professional."
        }
        Some(QuestionCategory::StepwiseProcedure) => {
            "I can't provide step-by-step instructions at this time. \
             For procedural guidance, please refer to official medical protocols."
        }
        _ => {
            "I'm unable to process your question at the moment. \
             Please try again later or consult appropriate medical resources."
        }
    }
}

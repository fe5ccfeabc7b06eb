use std::collections::HashMap;

use crate::config::{CategoryRule, TriageConfig};
use crate::types::{
    intents, ActionPlan, Classification, ConfidenceLevel, Domain, LlmMode, QuestionCategory,
    RiskLevel,
};

/// Turns a classification into an `ActionPlan`.
///
/// Non-medical questions are answered directly. Low confidence on anything
/// else forces a refusal before per-category rules are consulted. A label
/// with no rule gets the unclassified fallback.
#[derive(Debug, Clone)]
pub struct Planner {
    rules: HashMap<QuestionCategory, CategoryRule>,
}

impl Planner {
    pub fn new(rules: HashMap<QuestionCategory, CategoryRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &TriageConfig) -> Self {
        Self::new(config.category_rules.clone())
    }

    /// Plan for empty or near-empty input.
    pub fn invalid_plan() -> ActionPlan {
        ActionPlan {
            domain: Domain::Invalid,
            intent: intents::INVALID_INPUT.to_string(),
            confidence: 0.0,
            risk_level: RiskLevel::Low,
            needs_external_data: false,
            llm_mode: LlmMode::Refusal,
        }
    }

    /// Plan for input that hit the crisis denylist.
    pub fn crisis_plan() -> ActionPlan {
        ActionPlan {
            domain: Domain::Medical,
            intent: intents::DANGEROUS_OR_SENSITIVE.to_string(),
            confidence: 1.0,
            risk_level: RiskLevel::High,
            needs_external_data: false,
            llm_mode: LlmMode::Refusal,
        }
    }

    pub fn plan(&self, classification: &Classification, confidence: ConfidenceLevel) -> ActionPlan {
        let category = QuestionCategory::from_label(&classification.label);
        let score = classification.score;

        let plan = match (category, confidence) {
            (Some(QuestionCategory::NonMedical), _) => ActionPlan {
                domain: Domain::NonMedical,
                intent: intents::GENERAL_QUESTION.to_string(),
                confidence: score,
                risk_level: RiskLevel::Low,
                needs_external_data: false,
                llm_mode: LlmMode::Direct,
            },
            (_, ConfidenceLevel::Low) => ActionPlan {
                domain: Domain::Medical,
                intent: intents::UNCERTAIN_MEDICAL_QUESTION.to_string(),
                confidence: score,
                risk_level: RiskLevel::Medium,
                needs_external_data: true,
                llm_mode: LlmMode::Refusal,
            },
            (Some(category), _) => match self.rules.get(&category) {
                Some(rule) => ActionPlan {
                    domain: Domain::Medical,
                    intent: rule.intent.clone(),
                    confidence: score,
                    risk_level: rule.risk_level,
                    needs_external_data: true,
                    llm_mode: rule.llm_mode,
                },
                None => Self::unclassified(score),
            },
            (None, _) => Self::unclassified(score),
        };

        tracing::info!(
            label = %classification.label,
            score,
            confidence = ?confidence,
            intent = %plan.intent,
            risk = ?plan.risk_level,
            mode = ?plan.llm_mode,
            "Triage plan"
        );
        plan
    }

    fn unclassified(score: f32) -> ActionPlan {
        ActionPlan {
            domain: Domain::Unknown,
            intent: intents::UNCLASSIFIED.to_string(),
            confidence: score,
            risk_level: RiskLevel::Medium,
            needs_external_data: true,
            llm_mode: LlmMode::Refusal,
        }
    }
}

impl Default for Planner {
    fn default() -> Self {
        Self::from_config(&TriageConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification(category: QuestionCategory, score: f32) -> Classification {
        Classification {
            label: category.label().to_string(),
            score,
        }
    }

    #[test]
    fn test_definition_is_direct() {
        let plan = Planner::default().plan(
            &classification(QuestionCategory::Definition, 0.9),
            ConfidenceLevel::High,
        );
        assert_eq!(plan.domain, Domain::Medical);
        assert_eq!(plan.intent, intents::MEDICAL_DEFINITION);
        assert_eq!(plan.risk_level, RiskLevel::Low);
        assert_eq!(plan.llm_mode, LlmMode::Direct);
        assert!(plan.needs_external_data);
    }

    #[test]
    fn test_judgement_categories_refuse_even_when_confident() {
        let planner = Planner::default();
        for category in [
            QuestionCategory::Reasoning,
            QuestionCategory::StepwiseProcedure,
            QuestionCategory::MultipleChoice,
        ] {
            let plan = planner.plan(&classification(category, 0.99), ConfidenceLevel::High);
            assert_eq!(plan.intent, intents::MEDICAL_REASONING);
            assert_eq!(plan.risk_level, RiskLevel::Medium);
            assert!(plan.is_refusal());
        }
    }

    #[test]
    fn test_low_confidence_overrides_rules() {
        let plan = Planner::default().plan(
            &classification(QuestionCategory::Definition, 0.2),
            ConfidenceLevel::Low,
        );
        assert_eq!(plan.intent, intents::UNCERTAIN_MEDICAL_QUESTION);
        assert!(plan.is_refusal());
        assert!(plan.needs_external_data);
    }

    #[test]
    fn test_non_medical_ignores_confidence() {
        let plan = Planner::default().plan(
            &classification(QuestionCategory::NonMedical, 0.1),
            ConfidenceLevel::Low,
        );
        assert_eq!(plan.domain, Domain::NonMedical);
        assert_eq!(plan.llm_mode, LlmMode::Direct);
        assert!(!plan.needs_external_data);
    }

    #[test]
    fn test_unknown_label_and_missing_rule_fall_back() {
        let unknown = Classification {
            label: "astrology question".into(),
            score: 0.9,
        };
        let plan = Planner::default().plan(&unknown, ConfidenceLevel::High);
        assert_eq!(plan.domain, Domain::Unknown);
        assert_eq!(plan.intent, intents::UNCLASSIFIED);
        assert!(plan.is_refusal());

        let empty = Planner::new(HashMap::new());
        let plan = empty.plan(
            &classification(QuestionCategory::Definition, 0.9),
            ConfidenceLevel::High,
        );
        assert_eq!(plan.intent, intents::UNCLASSIFIED);
    }

    #[test]
    fn test_configured_rule_is_used() {
        let mut rules = HashMap::new();
        rules.insert(
            QuestionCategory::MultipleChoice,
            CategoryRule {
                intent: "exam_question".into(),
                risk_level: RiskLevel::High,
                llm_mode: LlmMode::Refusal,
            },
        );
        let plan = Planner::new(rules).plan(
            &classification(QuestionCategory::MultipleChoice, 0.6),
            ConfidenceLevel::Medium,
        );
        assert_eq!(plan.intent, "exam_question");
        assert_eq!(plan.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_fixed_plans() {
        let invalid = Planner::invalid_plan();
        assert_eq!(invalid.domain, Domain::Invalid);
        assert!(invalid.is_refusal());
        assert!(!invalid.needs_external_data);

        let crisis = Planner::crisis_plan();
        assert_eq!(crisis.risk_level, RiskLevel::High);
        assert_eq!(crisis.confidence, 1.0);
        assert!(crisis.is_refusal());
    }
}

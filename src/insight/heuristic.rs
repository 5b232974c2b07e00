//! Rule-based insight strategy.
//!
//! Deterministic keyword scan over recent transcript text. Always succeeds,
//! which makes it the unconditional fallback whenever the LLM strategy is
//! unavailable, cooling down, or failed. Keyword sets are French, matching
//! the calls this product coaches.

use anyhow::Result;

use super::{AnalysisContext, FrameworkScores, InsightBundle, InsightItem, InsightStrategy};

/// No next-step keyword after this many minutes raises an alert.
const NEXT_STEP_ALERT_AFTER_MIN: f64 = 15.0;

const PRICE_OBJECTION_PHRASES: &[&str] = &[
    "trop cher",
    "très cher",
    "coûte cher",
    "pas le budget",
    "hors budget",
    "budget serré",
    "prix élevé",
    "tarif élevé",
];

const CURRENT_TOOL_PHRASES: &[&str] = &[
    "on utilise déjà",
    "nous utilisons déjà",
    "notre outil actuel",
    "notre solution actuelle",
    "déjà équipé",
    "déjà un outil",
];

const COMPETITORS: &[&str] = &["salesforce", "hubspot", "pipedrive", "zoho", "sellsy"];

// One keyword per letter of each qualification framework.
const MEDDIC_KEYWORDS: &[&str] = &[
    "mesurable",
    "décideur",
    "critère",
    "processus",
    "problème",
    "champion",
];
const BANT_KEYWORDS: &[&str] = &["budget", "décideur", "besoin", "délai"];
const SPICED_KEYWORDS: &[&str] = &["situation", "problème", "impact", "urgence", "décision"];

const DECISION_MAKER_KEYWORDS: &[&str] = &["décideur", "décisionnaire", "directeur", "direction générale"];

const NEXT_STEP_KEYWORDS: &[&str] = &[
    "prochaine étape",
    "rendez-vous",
    "rdv",
    "semaine prochaine",
    "on se rappelle",
    "calendrier",
    "planifier",
];

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

fn coverage_score(text: &str, keywords: &[&str]) -> u32 {
    if keywords.is_empty() {
        return 0;
    }
    let found = keywords.iter().filter(|k| text.contains(*k)).count();
    ((found as f64 / keywords.len() as f64) * 100.0).round() as u32
}

/// Builds a full bundle from lowercased recent transcript text and the
/// elapsed call duration.
pub fn generate(text: &str, duration_minutes: f64) -> InsightBundle {
    let mut bundle = InsightBundle::default();

    if contains_any(text, PRICE_OBJECTION_PHRASES) {
        bundle.objections.push(InsightItem::new(
            "Objection prix détectée",
            &[
                "Recentrer la discussion sur la valeur et le ROI",
                "Chiffrer le coût du statu quo avec le prospect",
            ],
        ));
        bundle.suggestions.push(InsightItem::new(
            "Recadrer la discussion prix",
            &[
                "Demander à quoi le tarif est comparé",
                "Décomposer le prix par utilisateur et par mois",
            ],
        ));
    }

    if contains_any(text, CURRENT_TOOL_PHRASES) {
        bundle.objections.push(InsightItem::new(
            "Outil déjà en place",
            &[
                "Faire lister les limites de la solution actuelle",
                "Proposer un pilote en parallèle plutôt qu'un remplacement sec",
            ],
        ));
    }

    if let Some(competitor) = COMPETITORS.iter().find(|c| text.contains(*c)) {
        bundle.battle_cards.push(InsightItem::new(
            format!("Concurrent mentionné : {competitor}"),
            &[
                "Mettre en avant nos différenciateurs sur ce segment",
                "Demander ce qui manque à leur solution aujourd'hui",
            ],
        ));
    }

    bundle.framework_scores = FrameworkScores {
        meddic: coverage_score(text, MEDDIC_KEYWORDS),
        bant: coverage_score(text, BANT_KEYWORDS),
        spiced: coverage_score(text, SPICED_KEYWORDS),
    };

    if !contains_any(text, DECISION_MAKER_KEYWORDS) {
        bundle
            .missing_signals
            .push("Décideur non identifié".to_string());
    }
    if !text.contains("budget") {
        bundle.missing_signals.push("Budget non qualifié".to_string());
    }

    if duration_minutes > NEXT_STEP_ALERT_AFTER_MIN && !contains_any(text, NEXT_STEP_KEYWORDS) {
        bundle.next_step_alerts.push(format!(
            "Plus de {NEXT_STEP_ALERT_AFTER_MIN:.0} minutes sans next step verrouillé"
        ));
    }

    // A coaching overlay with nothing to suggest reads as broken.
    if bundle.suggestions.is_empty() {
        bundle.suggestions.push(InsightItem::new(
            "Poser une question de qualification",
            &[
                "Qui d'autre est impliqué dans la décision ?",
                "Quelle échéance visez-vous pour la mise en place ?",
            ],
        ));
    }

    bundle
}

/// Trait adapter so the heuristic is interchangeable with the LLM strategy.
pub struct HeuristicStrategy;

#[async_trait::async_trait]
impl InsightStrategy for HeuristicStrategy {
    async fn analyze(&self, ctx: &AnalysisContext) -> Result<InsightBundle> {
        Ok(generate(&ctx.transcript_text.to_lowercase(), ctx.duration_minutes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_transcript_still_suggests_and_scores_zero() {
        let bundle = generate("", 0.0);
        assert!(!bundle.suggestions.is_empty());
        assert_eq!(bundle.framework_scores, FrameworkScores::default());
        assert!(bundle.objections.is_empty());
        assert!(bundle.battle_cards.is_empty());
    }

    #[test]
    fn price_objection_yields_objection_and_suggestion() {
        let text = "seller: c'est trop cher\nbuyer: ok".to_lowercase();
        let bundle = generate(&text, 2.0);
        assert!(!bundle.objections.is_empty());
        assert!(!bundle.suggestions.is_empty());
        assert_eq!(bundle.objections[0].title, "Objection prix détectée");
    }

    #[test]
    fn competitor_mention_yields_battle_card() {
        let bundle = generate("buyer: on regarde aussi salesforce en ce moment", 5.0);
        assert_eq!(bundle.battle_cards.len(), 1);
        assert!(bundle.battle_cards[0].title.contains("salesforce"));
    }

    #[test]
    fn current_tool_yields_displacement_objection() {
        let bundle = generate("buyer: on utilise déjà un crm interne", 5.0);
        assert!(bundle
            .objections
            .iter()
            .any(|o| o.title == "Outil déjà en place"));
    }

    #[test]
    fn framework_scores_are_coverage_percentages() {
        // 2 of 4 BANT keywords -> 50.
        let bundle = generate("seller: quel est votre budget et votre besoin principal", 1.0);
        assert_eq!(bundle.framework_scores.bant, 50);
    }

    #[test]
    fn budget_mention_clears_missing_signal() {
        let with_budget = generate("buyer: le budget est validé", 1.0);
        assert!(!with_budget
            .missing_signals
            .iter()
            .any(|s| s.contains("Budget")));

        let without = generate("buyer: bonjour", 1.0);
        assert!(without.missing_signals.iter().any(|s| s.contains("Budget")));
    }

    #[test]
    fn next_step_alert_only_after_threshold() {
        assert!(generate("buyer: bonjour", 16.0)
            .next_step_alerts
            .iter()
            .any(|a| a.contains("next step")));
        assert!(generate("buyer: bonjour", 10.0).next_step_alerts.is_empty());
        // Locked next step suppresses the alert even on long calls.
        assert!(generate("seller: on planifie un rendez-vous mardi", 20.0)
            .next_step_alerts
            .is_empty());
    }

    #[test]
    fn deterministic_for_same_input() {
        let a = generate("buyer: c'est trop cher", 3.0);
        let b = generate("buyer: c'est trop cher", 3.0);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn strategy_trait_lowercases_and_delegates() {
        let ctx = AnalysisContext {
            transcript_text: "buyer: C'EST TROP CHER".to_string(),
            meeting_label: String::new(),
            prompt: String::new(),
            client_description: String::new(),
            duration_minutes: 1.0,
            talk_ratio: crate::transcript::TalkRatio { seller: 50, buyer: 50 },
        };
        let bundle = HeuristicStrategy.analyze(&ctx).await.unwrap();
        assert!(!bundle.objections.is_empty());
    }
}

//! The closed set of executive roles and their per-role strategy.
//!
//! Each role carries a system-prompt builder and a keyword lexicon used by
//! the delegation engine's scoring pass. New roles mean adding a variant
//! here plus a lexicon — there is no open inheritance hierarchy.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Role {
    /// Default assignee when no other role clears the delegation threshold.
    Director,
    Cto,
    Cfo,
    Cmo,
    Coo,
    Sales,
    CustomerService,
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "director" | "ceo" => Some(Self::Director),
            "cto" | "engineering" | "tech" => Some(Self::Cto),
            "cfo" | "finance" => Some(Self::Cfo),
            "cmo" | "marketing" => Some(Self::Cmo),
            "coo" | "operations" | "ops" => Some(Self::Coo),
            "sales" => Some(Self::Sales),
            "customerservice" | "customer-service" | "support" => Some(Self::CustomerService),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Director => "director",
            Self::Cto => "cto",
            Self::Cfo => "cfo",
            Self::Cmo => "cmo",
            Self::Coo => "coo",
            Self::Sales => "sales",
            Self::CustomerService => "customer_service",
        }
    }

    pub fn all() -> &'static [Role] {
        &[
            Role::Director,
            Role::Cto,
            Role::Cfo,
            Role::Cmo,
            Role::Coo,
            Role::Sales,
            Role::CustomerService,
        ]
    }

    /// System prompt prefix for this role, prepended to the base execution prompt.
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::Director => DIRECTOR_PROMPT,
            Self::Cto => CTO_PROMPT,
            Self::Cfo => CFO_PROMPT,
            Self::Cmo => CMO_PROMPT,
            Self::Coo => COO_PROMPT,
            Self::Sales => SALES_PROMPT,
            Self::CustomerService => CUSTOMER_SERVICE_PROMPT,
        }
    }

    /// Keyword lexicon used for delegation scoring. Lowercase, no punctuation.
    pub fn keyword_lexicon(&self) -> &'static [&'static str] {
        match self {
            Self::Director => &[],
            Self::Cto => &[
                "api", "latency", "deploy", "deployment", "bug", "architecture", "server",
                "database", "infrastructure", "pipeline", "code", "engineering", "outage",
                "staging", "production", "cluster", "kubernetes", "scaling",
            ],
            Self::Cfo => &[
                "budget", "revenue", "margin", "forecast", "cash", "burn", "expense", "invoice",
                "funding", "valuation", "runway", "profit", "cost", "financial", "accounting",
            ],
            Self::Cmo => &[
                "campaign", "brand", "marketing", "audience", "conversion", "seo", "content",
                "social", "advertising", "launch", "positioning", "press",
            ],
            Self::Coo => &[
                "process", "operations", "logistics", "supply", "vendor", "hiring", "workflow",
                "efficiency", "compliance", "checklist", "onboarding",
            ],
            Self::Sales => &[
                "deal", "pipeline", "quota", "lead", "prospect", "contract", "renewal", "churn",
                "upsell", "demo", "closing",
            ],
            Self::CustomerService => &[
                "ticket", "complaint", "refund", "support", "issue", "customer", "escalation",
                "satisfaction", "response", "help",
            ],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Builds the final system prompt for a role: `[role prefix]\n\n---\n\n[base prompt]`.
pub fn build_role_prompt(role: Role, base_prompt: &str) -> String {
    format!("{}\n\n---\n\n{}", role.system_prompt(), base_prompt)
}

const DIRECTOR_PROMPT: &str = "\
You are the Director (CEO). You handle requests that don't clearly belong to a \
specialized department, and you set direction when delegation is ambiguous.

Role guidelines:
- Give a clear, decisive answer even under incomplete information.
- When a request actually belongs to a specialist, say so and summarize what you'd hand off.
- Keep responses grounded in what the team can realistically do.";

const CTO_PROMPT: &str = "\
You are the CTO. Your specialty is engineering, infrastructure, and technical architecture.

Role guidelines:
- Reason about technical trade-offs explicitly: latency, cost, reliability, complexity.
- Call out risk before recommending a deployment or architecture change.
- Be concrete: name the system, the change, and the rollback plan.";

const CFO_PROMPT: &str = "\
You are the CFO. Your specialty is budgets, forecasting, and financial health.

Role guidelines:
- Ground answers in numbers where possible; state assumptions when you don't have them.
- Distinguish cash position from accounting profit.
- Flag when a request needs data you don't have instead of guessing a figure.";

const CMO_PROMPT: &str = "\
You are the CMO. Your specialty is marketing, brand, and growth campaigns.

Role guidelines:
- Tie recommendations to audience and channel.
- Separate brand-building moves from performance/conversion moves.
- Keep claims about campaign impact measurable.";

const COO_PROMPT: &str = "\
You are the COO. Your specialty is operations, process, and execution.

Role guidelines:
- Turn requests into concrete steps with an owner and a sequence.
- Call out process or staffing bottlenecks before they become blockers.
- Prefer the simplest workflow that actually gets the work done.";

const SALES_PROMPT: &str = "\
You are the head of Sales. Your specialty is pipeline, deals, and customer commitments.

Role guidelines:
- Frame answers around deal stage and what moves a deal forward.
- Be explicit about what you can commit to a prospect versus what needs approval.
- Flag churn risk early rather than after a renewal is lost.";

const CUSTOMER_SERVICE_PROMPT: &str = "\
You are the head of Customer Service. Your specialty is support tickets and customer satisfaction.

Role guidelines:
- Triage by severity and customer impact first.
- Keep a consistent, empathetic tone that a support agent could reuse verbatim.
- Escalate when a fix requires engineering or a policy exception.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_matches_aliases() {
        assert_eq!(Role::from_str("CTO"), Some(Role::Cto));
        assert_eq!(Role::from_str("finance"), Some(Role::Cfo));
        assert_eq!(Role::from_str("nonsense"), None);
    }

    #[test]
    fn prompt_includes_role_prefix_and_base() {
        let prompt = build_role_prompt(Role::Cfo, "Answer the user's question.");
        assert!(prompt.contains("CFO"));
        assert!(prompt.ends_with("Answer the user's question."));
    }

    #[test]
    fn director_has_empty_lexicon_by_design() {
        assert!(Role::Director.keyword_lexicon().is_empty());
    }
}

//! Policy layer (ordered rules, evaluator, policy sources).
//!
//! Rule documents are compiled once at load time (globs, `HH:MM` windows,
//! duplicate-id checks) so evaluation is plain matching against an immutable
//! snapshot.

pub mod engine;
pub mod rules;
pub mod source;

pub use engine::{PolicyEvaluator, PolicyVerdict};
pub use rules::{PolicyConfig, PolicyRule, RuleConditions, TimeOfDay, TimeWindow};
pub use source::{default_policy, load_or_default, FilePolicySource, PolicySource, StaticPolicySource};

//! Rules map a description pattern to a category and optional subcategory.
//!
//! They are offered as hints when predicting a category and can be applied in bulk to the
//! transactions already stored.

mod apply;
mod core;
mod endpoints;

pub use apply::apply_rule;
pub use core::{
    RULE_REQUIRED_FIELDS_MSG, Rule, RuleId, create_rule, create_rule_table, delete_rule,
    get_matching_rules, get_rule, get_rules, update_rule,
};
pub use endpoints::{
    RuleState, apply_rule_endpoint, create_rule_endpoint, delete_rule_endpoint,
    list_rules_endpoint, update_rule_endpoint,
};

//! Policy rule inheritance through `inherits`.

use std::collections::HashSet;

use crate::model::{Policy, PolicyRule};

enum Walk<'a> {
    /// Ancestors nearest-first; stops at a missing parent.
    Chain(Vec<&'a Policy>),
    /// The chain revisits `name`.
    Cycle(String),
}

fn walk<'a>(policies: &'a [Policy], policy: &'a Policy) -> Walk<'a> {
    let mut seen: HashSet<&str> = HashSet::from([policy.name.as_str()]);
    let mut chain = Vec::new();
    let mut current = policy;
    while !current.inherits.is_empty() {
        let Some(parent) = policies.iter().find(|p| p.name == current.inherits) else {
            break;
        };
        if !seen.insert(parent.name.as_str()) {
            return Walk::Cycle(parent.name.clone());
        }
        chain.push(parent);
        current = parent;
    }
    Walk::Chain(chain)
}

/// Inherited rules root-first, then the policy's own. A looping chain
/// yields only the local rules.
pub fn effective_rules(policies: &[Policy], policy: &Policy) -> Vec<PolicyRule> {
    match walk(policies, policy) {
        Walk::Cycle(_) => policy.rules.clone(),
        Walk::Chain(chain) => chain
            .iter()
            .rev()
            .flat_map(|p| p.rules.iter())
            .chain(policy.rules.iter())
            .cloned()
            .collect(),
    }
}

/// Ancestor names, root-first. Empty when the chain loops.
pub fn inheritance_chain(policies: &[Policy], policy: &Policy) -> Vec<String> {
    match walk(policies, policy) {
        Walk::Cycle(_) => Vec::new(),
        Walk::Chain(chain) => chain.iter().rev().map(|p| p.name.clone()).collect(),
    }
}

/// Name of the policy at which the chain starting from `policy` loops.
pub fn find_cycle(policies: &[Policy], policy: &Policy) -> Option<String> {
    match walk(policies, policy) {
        Walk::Cycle(name) => Some(name),
        Walk::Chain(_) => None,
    }
}

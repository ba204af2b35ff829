#![no_main]
use arbitrary::Arbitrary;
use bastion_iam::{Decision, Scope, ScopeAuthorizer};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct RawScope {
    namespace: String,
    resources: Vec<String>,
    actions: Vec<String>,
}

impl From<RawScope> for Scope {
    fn from(raw: RawScope) -> Self {
        Scope::new(raw.namespace, raw.resources, raw.actions)
    }
}

#[derive(Arbitrary, Debug)]
struct Input {
    held: Vec<RawScope>,
    requested: Vec<RawScope>,
}

fuzz_target!(|input: Input| {
    let held: Vec<Scope> = input.held.into_iter().map(Scope::from).collect();
    let requested: Vec<Scope> = input.requested.into_iter().map(Scope::from).collect();

    let decision = ScopeAuthorizer::evaluate(&held, &requested);
    assert_eq!(decision.is_allowed(), ScopeAuthorizer::authorize(&held, &requested));

    // A scope set always covers itself
    assert!(ScopeAuthorizer::authorize(&requested, &requested));

    if let Decision::Deny { namespace, resource, action } = decision {
        assert!(!held.iter().any(|h| h.covers(&namespace, &resource, &action)));
    }
});

//! Integration tests for role administration as seen through the token.
//!
//! Follows a registry through a realistic sequence: the creator grants
//! roles, a new administrator takes over and removes the creator, and
//! every change shows up in the token's event log.

use ppo_contracts::{Event, Ledger, LedgerError, Principal, Role};

fn p(label: &str) -> Principal {
    Principal::derive(label)
}

#[test]
fn administration_handover() {
    let (owner, stranger, another) = (p("owner"), p("stranger"), p("another"));
    let mut token = Ledger::product_protocol(1_000, owner);

    assert!(token.is_owner(&owner));
    assert!(!token.is_owner(&stranger));
    assert!(!token.is_minter(&stranger));

    token.add_minter(&owner, stranger).unwrap();
    assert!(token.is_minter(&stranger));
    assert!(!token.is_owner(&stranger));

    // A minter cannot hand out roles.
    assert_eq!(
        token.add_owner(&stranger, another),
        Err(LedgerError::Unauthorized { role: Role::Owner, caller: stranger })
    );
    assert!(token.add_minter(&stranger, another).is_err());

    token.add_owner(&owner, another).unwrap();
    token.delete_owner(&another, owner).unwrap();
    assert!(!token.is_owner(&owner));

    token.delete_minter(&another, stranger).unwrap();
    assert!(!token.is_minter(&stranger));
    assert!(token.roles().require_minter_role(&stranger).is_err());
    assert!(token.mint(&stranger, stranger, 1).is_err());

    let emitted: Vec<Event> = token.events().events().cloned().collect();
    assert_eq!(
        emitted,
        vec![
            Event::AddMinter { who: stranger },
            Event::AddOwner { who: another },
            Event::DeleteOwner { who: owner },
            Event::DeleteMinter { who: stranger },
        ]
    );
}

#[test]
fn rejected_role_changes_emit_nothing() {
    let mut token = Ledger::product_protocol(1_000, p("owner"));
    assert!(token.add_owner(&p("x"), p("x")).is_err());
    assert!(token.delete_owner(&p("x"), p("owner")).is_err());
    assert!(token.events().is_empty());
}

#[test]
fn token_without_owners_is_frozen() {
    let mut token = Ledger::product_protocol(1_000, p("owner"));
    token.add_minter(&p("owner"), p("minter")).unwrap();
    token.delete_owner(&p("owner"), p("owner")).unwrap();

    assert_eq!(token.roles().owners().count(), 0);
    assert!(token.finalize(&p("owner")).is_err());
    assert!(token.add_owner(&p("owner"), p("owner")).is_err());
    // Existing minters keep working until the cap.
    token.mint(&p("minter"), p("a"), 1_000).unwrap();
}

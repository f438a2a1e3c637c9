use crate::{Interner, Name};

#[test]
fn repeated_text_keeps_its_name() {
    let mut interner = Interner::new();

    let first = interner.intern("fn");
    let other = interner.intern("arg");
    let again = interner.intern("fn");

    assert_eq!(first, again);
    assert_ne!(first, other);
    assert_eq!(interner.len(), 2);
}

#[test]
fn names_are_insertion_indices() {
    let mut interner = Interner::new();

    let late = interner.intern("zeta");
    let early = interner.intern("alpha");

    assert_eq!(late.index(), 0);
    assert_eq!(early, Name::from_index(1));
    assert!(late < early);
}

#[test]
fn lookup_without_inserting() {
    let mut interner = Interner::new();
    interner.intern("call");

    assert_eq!(interner.get("call"), Some(Name::from_index(0)));
    assert!(interner.get("def").is_none());
    assert_eq!(interner.len(), 1);
}

#[test]
fn out_of_range_names_do_not_resolve() {
    let interner = Interner::new();

    assert!(interner.is_empty());
    assert!(interner.try_resolve(Name::from_index(3)).is_none());
}

#[test]
fn iteration_follows_insertion() {
    let mut interner = Interner::new();
    interner.intern("callee");
    interner.intern("argument");

    let all: Vec<(usize, &str)> = interner.iter().map(|(name, text)| (name.index(), text)).collect();
    assert_eq!(all, [(0, "callee"), (1, "argument")]);
    assert_eq!(interner.resolve(Name::from_index(1)), "argument");
}

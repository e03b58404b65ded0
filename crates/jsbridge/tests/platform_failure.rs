//! A failed platform setup is sticky. Runs in its own process because the
//! outcome is stored for the lifetime of the process.

use jsbridge::{platform, EngineInstance, Error, InitOptions, InstanceOptions};
use jsbridge_testkit::ScriptedEngine;

#[test]
fn test_failed_initialization_is_reported_to_every_caller() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("icudtl.dat");

    let first = platform::initialize::<ScriptedEngine>(&InitOptions::with_icu_data(&missing));
    let Err(Error::Init(message)) = first else {
        panic!("expected init failure, got {:?}", first);
    };
    assert!(message.contains("failed to load character-set data"), "{message}");

    // A later call with working options still sees the stored failure
    let second = platform::initialize::<ScriptedEngine>(&InitOptions::default());
    assert_eq!(second, Err(Error::Init(message)));
    assert!(!platform::is_initialized::<ScriptedEngine>());

    assert!(EngineInstance::<ScriptedEngine>::new(&InstanceOptions::default()).is_err());
}

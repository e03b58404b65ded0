//! Instance creation before platform setup. Runs in its own process so no
//! other test has initialized the platform yet.

use jsbridge::{platform, EngineInstance, Error, InstanceOptions};
use jsbridge_testkit::ScriptedEngine;

#[test]
fn test_instance_requires_initialized_platform() {
    assert!(!platform::is_initialized::<ScriptedEngine>());
    let err = EngineInstance::<ScriptedEngine>::new(&InstanceOptions::default()).unwrap_err();
    assert_eq!(
        err,
        Error::InstanceCreation("engine platform is not initialized".into())
    );
}

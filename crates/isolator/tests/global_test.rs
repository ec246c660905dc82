//! The process-wide instance holder.

use std::sync::Arc;

use isolator::global::{self, IsolatorSlot};
use isolator::{Arg, CallError, Isolator, SharedIsolator, Value};

struct Named(&'static str);

impl Isolator for Named {
    fn call(&self, _name: &str, _args: &mut [Arg<'_>]) -> Result<Value, CallError> {
        Ok(Value::from(self.0))
    }
}

#[test]
fn installed_instance_is_shared_until_cleared() {
    let installed: SharedIsolator = Arc::new(Named("installed"));
    global::set(Some(Arc::clone(&installed)));
    assert!(global::global().is_initialized());

    let got = global::get(None).unwrap();
    assert!(Arc::ptr_eq(&got, &installed));

    let explicit: SharedIsolator = Arc::new(Named("explicit"));
    let got = global::get(Some(Arc::clone(&explicit))).unwrap();
    assert!(Arc::ptr_eq(&got, &explicit));
    assert!(Arc::ptr_eq(&global::get(None).unwrap(), &installed));

    let slot = IsolatorSlot::new();
    let via_slot = slot.isolator().unwrap();
    assert_eq!(via_slot.call("anything", &mut []).unwrap(), Value::from("installed"));

    global::set(None);
    assert!(!global::global().is_initialized());
}

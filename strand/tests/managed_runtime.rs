#![expect(missing_docs)]

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use strand::vm::{self, EnvironmentPtr, VirtualMachine};
use strand::{Payload, Priority, ThreadSystem, context};

#[derive(Debug)]
struct Machine {
    attached: AtomicUsize,
    detached: AtomicUsize,
}

impl VirtualMachine for Machine {
    fn attach_current_thread(&self) -> strand_osal_api::Result<EnvironmentPtr> {
        self.attached.fetch_add(1, Ordering::SeqCst);
        Ok(NonNull::<c_void>::dangling())
    }

    fn detach_current_thread(&self) {
        self.detached.fetch_add(1, Ordering::SeqCst);
    }
}

static MACHINE: Machine = Machine {
    attached: AtomicUsize::new(0),
    detached: AtomicUsize::new(0),
};

#[test]
fn threads_detach_when_leaving_their_entry() {
    vm::register(&MACHINE).unwrap();

    let system = ThreadSystem::default();
    let thread = system
        .create(
            |_| {
                vm::attach().ok()?;
                vm::attach().ok()?;
                Some(Payload::new(vm::environment().is_some()))
            },
            "attached",
            Priority::Normal,
            0,
        )
        .unwrap();

    for _ in 0..2 {
        system.start(thread, None).unwrap();
        let attached = system.join(thread).unwrap().unwrap();
        assert_eq!(attached.downcast_ref::<bool>(), Some(&true));
    }
    assert_eq!(MACHINE.attached.load(Ordering::SeqCst), 2);
    assert_eq!(MACHINE.detached.load(Ordering::SeqCst), 2);

    // Foreign threads detach through `finalize`.
    std::thread::spawn(|| {
        vm::attach().unwrap();
        context::finalize();
        assert_eq!(vm::environment(), None);
    })
    .join()
    .unwrap();
    assert_eq!(MACHINE.detached.load(Ordering::SeqCst), 3);

    system.destroy(thread).unwrap();
}

#![expect(missing_docs, reason = "tests")]

use std::sync::{LazyLock, Mutex};

use pretty_assertions::assert_eq;
use serial_test::serial;
use strand::assert::{self, Console, MessageDisplay};
use strand::{Error, Priority, ThreadHandle, ThreadSystem, context};

static REPORTS: Mutex<Vec<Report>> = Mutex::new(Vec::new());

#[derive(Debug, Clone, PartialEq, Eq)]
struct Report {
    condition: String,
    file: String,
    line: u32,
    message: String,
}

fn recording_handler(condition: &str, file: &str, line: u32, message: &str) -> i32 {
    REPORTS.lock().unwrap().push(Report {
        condition: condition.into(),
        file: file.into(),
        line,
        message: message.into(),
    });
    -1
}

/// Runs `f` with [`recording_handler`] installed and returns the reports it produced.
fn recorded(f: impl FnOnce()) -> Vec<Report> {
    REPORTS.lock().unwrap().clear();
    assert::set_handler(Some(recording_handler));
    f();
    assert::set_handler(None);
    std::mem::take(&mut *REPORTS.lock().unwrap())
}

#[test]
#[serial]
fn stale_handle_is_reported_at_call_site() {
    let system = ThreadSystem::default();
    let thread = system
        .create(|_| None, "short-lived", Priority::Normal, 0)
        .unwrap();
    system.destroy(thread).unwrap();

    let mut line = 0;
    let reports = recorded(|| {
        line = line!() + 1;
        assert!(!system.is_running(thread));
        assert_eq!(system.terminate(thread), Err(Error::InvalidHandle(thread)));
        assert_eq!(system.destroy(thread), Err(Error::InvalidHandle(thread)));
        assert_eq!(system.start(thread, None), Err(Error::InvalidHandle(thread)));
        // Validity queries do not report.
        assert!(!system.is_thread(thread));
    });

    assert_eq!(reports.len(), 4);
    assert_eq!(
        reports[0],
        Report {
            condition: "is_thread(handle)".into(),
            file: file!().into(),
            line,
            message: format!("is_running called with invalid thread handle {thread}"),
        }
    );
    assert!(reports[3].message.starts_with("start called"));
}

#[test]
#[serial]
fn null_handle_is_reported() {
    let system = ThreadSystem::default();
    let reports = recorded(|| {
        assert_eq!(system.name(ThreadHandle::NULL), Err(Error::InvalidHandle(ThreadHandle::NULL)));
    });
    assert_eq!(reports.len(), 1);
    assert_eq!(
        reports[0].message,
        "name called with invalid thread handle #null"
    );
}

#[test]
#[serial]
fn handler_result_is_passed_through() {
    assert::set_handler(Some(recording_handler));
    assert!(assert::handler().is_some());
    assert_eq!(assert::report(None, None, 3, None), -1);
    assert::set_handler(None);
    assert!(assert::handler().is_none());

    let reports = std::mem::take(&mut *REPORTS.lock().unwrap());
    assert_eq!(
        reports,
        vec![Report {
            condition: "<Static fail>".into(),
            file: "<No file>".into(),
            line: 3,
            message: "<No message>".into(),
        }]
    );
}

#[test]
#[serial]
fn formatted_reports_carry_their_location() {
    let mut line = 0;
    let reports = recorded(|| {
        line = line!() + 1;
        strand::report_failure!("count == 0", "{} items left", 3);
    });
    assert_eq!(
        reports,
        vec![Report {
            condition: "count == 0".into(),
            file: file!().into(),
            line,
            message: "3 items left".into(),
        }]
    );
}

static SHOWN: Mutex<Vec<(String, String)>> = Mutex::new(Vec::new());

struct Recorder;

impl MessageDisplay for Recorder {
    fn show(title: &str, message: &str) {
        SHOWN.lock().unwrap().push((title.into(), message.into()));
    }
}

#[test]
#[serial]
fn without_handler_the_layout_is_displayed() {
    assert::set_handler(None);
    assert::set_display::<Recorder>();
    assert_eq!(
        assert::report(Some("ready"), Some("worker.rs"), 42, Some("not ready")),
        0
    );
    assert::set_display::<Console>();

    let shown = std::mem::take(&mut *SHOWN.lock().unwrap());
    assert_eq!(
        shown,
        vec![(
            "Assert Failure".to_owned(),
            "****** ASSERT FAILED ******\nCondition: ready\nFile/line: worker.rs : 42\nnot ready\n".to_owned()
        )]
    );
}

#[test]
#[serial]
fn formatted_messages_are_bounded() {
    let reports = recorded(|| {
        strand::report_failure!("long", "{}", "x".repeat(4 * assert::BUFFER_SIZE));
    });
    assert_eq!(reports[0].message.len(), assert::BUFFER_SIZE - 1);
}

#[test]
#[serial]
fn only_one_thread_is_main() {
    context::set_main();
    assert!(context::is_main());

    let reports = recorded(|| {
        std::thread::spawn(|| {
            assert!(!context::is_main());
            context::set_main();
            assert!(!context::is_main());
        })
        .join()
        .unwrap();
    });

    assert!(context::is_main());
    assert_eq!(reports.len(), 1);
    assert!(reports[0].message.starts_with("main thread already designated"));
}

static SYSTEM: LazyLock<ThreadSystem> = LazyLock::new(ThreadSystem::default);

#[test]
#[serial]
fn thread_destroying_itself_is_detached() {
    let (sender, receiver) = std::sync::mpsc::sync_channel(1);
    let thread = SYSTEM
        .create(
            move |_| {
                SYSTEM.destroy(context::self_handle()).unwrap();
                sender.send(context::should_terminate()).unwrap();
                None
            },
            "self-destroying",
            Priority::Normal,
            0,
        )
        .unwrap();

    SYSTEM.start(thread, None).unwrap();
    assert!(receiver.recv().unwrap());
    assert!(!SYSTEM.is_thread(thread));
    assert_eq!(SYSTEM.join(thread), Err(Error::InvalidHandle(thread)));
}

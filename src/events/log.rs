use crate::events::{Event, EventKind, Observe};

/// Base observer that logs events to stdout.
///
/// Enabled via the `logging` feature. Useful for demos and debugging.
#[derive(Default)]
pub struct LogWriter;

impl Observe for LogWriter {
    fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::TaskStarted => {
                println!("[started] task={:?}", e.task);
            }
            EventKind::TaskFinished => match &e.reason {
                Some(err) => println!("[finished] task={:?} err={err}", e.task),
                None => println!("[finished] task={:?}", e.task),
            },
            EventKind::TaskSubmitted => {
                println!("[submitted] task={:?}", e.task);
            }
            EventKind::TaskRemoved | EventKind::PlanRemoved => {
                println!("[removed] task={:?}", e.task);
            }
            EventKind::PlanRun => {
                if let (Some(task), Some(it)) = (&e.task, e.iteration) {
                    println!("[run] plan={task} iteration={it}");
                }
            }
            EventKind::PlanFinished => match &e.reason {
                Some(err) => println!("[finished] plan={:?} err={err}", e.task),
                None => println!("[finished] plan={:?}", e.task),
            },
            EventKind::PlanScheduled => {
                println!("[scheduled] plan={:?}", e.task);
            }
            EventKind::Cleared => {
                println!("[cleared]");
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            EventKind::Terminated => {
                println!("[terminated]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}

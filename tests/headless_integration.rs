use std::sync::mpsc;
use std::time::{Duration, Instant};

use pomonotes::api::{
    ApiReply, ApiRequest, ApiResponse, Envelope, RecordingSink, RequestSink, RequestWorker,
    SessionApi,
};
use pomonotes::controller::{ControllerSettings, Intent, StudyController};
use pomonotes::error::ClientError;
use pomonotes::models::{Session, SessionCompletion, SessionId, SessionUpdate};
use pomonotes::notes::{NotesEdit, SaveStatus};
use pomonotes::runtime::{FixedTicker, Runner, StudyEvent, TestEventSource};
use pomonotes::timer::Phase;

fn session(id: u64, name: &str) -> Session {
    serde_json::from_value(serde_json::json!({ "id": id, "session_name": name })).unwrap()
}

fn reply(envelope: Envelope, result: Result<ApiReply, ClientError>) -> ApiResponse {
    ApiResponse {
        generation: envelope.generation,
        request: envelope.request,
        result,
    }
}

/// Controller with an accepted "Algebra" session and a clock origin.
fn started() -> (StudyController, RecordingSink, Instant) {
    let sink = RecordingSink::new();
    let mut controller =
        StudyController::new(ControllerSettings::default(), Box::new(sink.clone()));
    let t0 = Instant::now();
    controller.dispatch(Intent::StartSession("Algebra".into()), t0);
    let start = sink.take().pop().unwrap();
    controller.on_response(reply(start, Ok(ApiReply::Started(session(1, "Algebra")))), t0);
    (controller, sink, t0)
}

/// Runs the countdown for `secs` seconds of synthetic wall time, feeding
/// 100 ms ticks like the real runtime does.
fn run_for(controller: &mut StudyController, from: Instant, secs: u64) -> Instant {
    let mut now = from;
    for _ in 0..secs * 10 {
        now += Duration::from_millis(100);
        controller.on_tick(now);
    }
    now
}

#[test]
fn new_session_loads_a_full_work_phase() {
    let (controller, _, _) = started();
    assert_eq!(controller.timer().phase(), Phase::Work);
    assert_eq!(controller.timer().time_remaining(), 1500);
    assert!(!controller.timer().is_running());
}

#[test]
fn full_pomodoro_leads_to_short_break() {
    let (mut controller, sink, t0) = started();
    controller.dispatch(Intent::ToggleTimer, t0);
    run_for(&mut controller, t0, 1500);

    let timer = controller.timer();
    assert_eq!(timer.completed_pomodoros(), 1);
    assert_eq!(timer.phase(), Phase::ShortBreak);
    assert_eq!(timer.time_remaining(), 300);
    assert_eq!(timer.total_study_secs(), 1500);
    assert!(controller.take_bell());

    let sent = sink.take();
    assert!(sent.iter().any(|e| matches!(
        &e.request,
        ApiRequest::Update { update, .. } if update.pomodoros_completed == Some(1)
    )));
}

#[test]
fn fourth_pomodoro_earns_a_long_break() {
    let (mut controller, _, t0) = started();
    let mut now = t0;
    for round in 1..=4u32 {
        controller.dispatch(Intent::ToggleTimer, now);
        now = run_for(&mut controller, now, 1500);
        assert_eq!(controller.timer().completed_pomodoros(), round);
        if round < 4 {
            assert_eq!(controller.timer().phase(), Phase::ShortBreak);
            controller.dispatch(Intent::SkipBreak, now);
            assert_eq!(controller.timer().phase(), Phase::Work);
        }
    }
    assert_eq!(controller.timer().phase(), Phase::LongBreak);
    assert_eq!(controller.timer().time_remaining(), 900);

    controller.dispatch(Intent::ToggleTimer, now);
    run_for(&mut controller, now, 900);
    assert_eq!(controller.timer().phase(), Phase::Work);
    assert_eq!(controller.timer().time_remaining(), 1500);
}

#[test]
fn typing_burst_saves_once_after_debounce() {
    let (mut controller, sink, t0) = started();
    for c in "abc".chars() {
        controller.dispatch(Intent::EditNotes(NotesEdit::Insert(c)), t0);
    }
    let mut now = run_for(&mut controller, t0, 1);
    controller.dispatch(Intent::EditNotes(NotesEdit::Insert('d')), now);
    assert!(sink.is_empty());

    now = run_for(&mut controller, now, 5);
    let sent = sink.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].request,
        ApiRequest::SaveNotes {
            id: SessionId::from(1),
            notes: "abcd".into()
        }
    );

    // Nothing new to save once acknowledged.
    controller.on_response(reply(sent[0].clone(), Ok(ApiReply::Acknowledged)), now);
    run_for(&mut controller, now, 5);
    assert!(sink.is_empty());
}

#[test]
fn failed_auto_save_flags_error_then_fades() {
    let (mut controller, sink, t0) = started();
    controller.dispatch(Intent::EditNotes(NotesEdit::InsertStr("draft".into())), t0);
    let now = run_for(&mut controller, t0, 3);
    let save = sink.take().pop().unwrap();
    assert_eq!(controller.notes().status(now), SaveStatus::Saving);

    controller.on_response(reply(save, Err(ClientError::Status(500))), now);
    assert_eq!(controller.notes().status(now), SaveStatus::Error);
    assert!(controller.notes().has_unsaved_changes());
    assert!(controller.has_unsaved_notes());

    let later = run_for(&mut controller, now, 3);
    assert_eq!(controller.notes().status(later), SaveStatus::Idle);
    assert!(controller.notes().has_unsaved_changes());
    assert!(sink.is_empty());

    // The next edit retries with the full text.
    controller.dispatch(Intent::EditNotes(NotesEdit::Insert('!')), later);
    run_for(&mut controller, later, 3);
    let retry = sink.take();
    assert_eq!(retry.len(), 1);
    assert_eq!(
        retry[0].request,
        ApiRequest::SaveNotes {
            id: SessionId::from(1),
            notes: "draft!".into()
        }
    );
}

#[test]
fn ending_after_1530_study_seconds_reports_25_minutes() {
    let (mut controller, sink, t0) = started();
    controller.dispatch(Intent::ToggleTimer, t0);
    let mut now = run_for(&mut controller, t0, 1500);
    controller.dispatch(Intent::SkipBreak, now);
    controller.dispatch(Intent::ToggleTimer, now);
    now = run_for(&mut controller, now, 30);
    assert_eq!(controller.timer().total_study_secs(), 1530);
    sink.take();

    controller.dispatch(Intent::EndSession, now);
    let complete = sink.take().pop().unwrap();
    assert_eq!(
        complete.request,
        ApiRequest::Complete {
            id: SessionId::from(1),
            completion: SessionCompletion {
                total_duration: 25,
                pomodoros_completed: 1,
                notes: String::new(),
            }
        }
    );

    controller.on_response(reply(complete, Ok(ApiReply::Acknowledged)), now);
    assert_eq!(controller.timer().phase(), Phase::Idle);
    assert!(!controller.lifecycle().is_active());
}

#[test]
fn stale_start_reply_is_discarded() {
    let sink = RecordingSink::new();
    let mut controller =
        StudyController::new(ControllerSettings::default(), Box::new(sink.clone()));
    let now = Instant::now();

    controller.dispatch(Intent::StartSession("A".into()), now);
    let first = sink.take().pop().unwrap();
    controller.on_response(reply(first.clone(), Err(ClientError::Status(503))), now);

    controller.dispatch(Intent::StartSession("B".into()), now);
    let second = sink.take().pop().unwrap();

    // A late duplicate of the first reply must not activate anything.
    controller.on_response(reply(first, Ok(ApiReply::Started(session(1, "A")))), now);
    assert!(!controller.lifecycle().is_active());

    controller.on_response(reply(second, Ok(ApiReply::Started(session(2, "B")))), now);
    assert_eq!(controller.lifecycle().active().unwrap().name, "B");
}

/// In-memory backend for driving the real worker thread.
#[derive(Clone)]
struct MemoryApi;

impl SessionApi for MemoryApi {
    fn start_session(&self, name: &str) -> Result<Session, ClientError> {
        Ok(session(42, name))
    }
    fn update_session(&self, _: &SessionId, _: &SessionUpdate) -> Result<(), ClientError> {
        Ok(())
    }
    fn complete_session(&self, _: &SessionId, _: &SessionCompletion) -> Result<(), ClientError> {
        Ok(())
    }
    fn list_sessions(&self) -> Result<Vec<Session>, ClientError> {
        Ok(vec![session(42, "Algebra")])
    }
    fn get_session(&self, id: &SessionId) -> Result<Session, ClientError> {
        Err(ClientError::Transport(format!("no route to {id}")))
    }
    fn delete_session(&self, _: &SessionId) -> Result<(), ClientError> {
        Ok(())
    }
}

// Worker replies travel through the same channel the runner reads, exactly
// like the binary wires it up.
#[test]
fn worker_replies_flow_through_the_runner() {
    let (tx, rx) = mpsc::channel::<StudyEvent>();
    let worker = RequestWorker::spawn(MemoryApi, tx);
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    let mut controller = StudyController::new(ControllerSettings::default(), Box::new(worker));
    let now = Instant::now();
    controller.dispatch(Intent::StartSession("Algebra".into()), now);
    controller.dispatch(Intent::LoadHistory, now);

    let mut replies = 0;
    for _ in 0..400u32 {
        match runner.step() {
            StudyEvent::Api(response) => {
                controller.on_response(response, now);
                replies += 1;
                if replies == 2 {
                    break;
                }
            }
            StudyEvent::Tick => controller.on_tick(now),
            _ => {}
        }
    }

    assert_eq!(replies, 2);
    assert_eq!(
        controller.lifecycle().active().map(|a| a.id.clone()),
        Some(SessionId::from(42))
    );
    assert_eq!(controller.timer().phase(), Phase::Work);
    assert_eq!(controller.history().sessions().len(), 1);
}

#[test]
fn recording_sink_is_a_request_sink() {
    let sink = RecordingSink::new();
    let handle: &dyn RequestSink = &sink;
    handle.submit(Envelope {
        generation: 0,
        request: ApiRequest::List,
    });
    assert_eq!(sink.len(), 1);
}

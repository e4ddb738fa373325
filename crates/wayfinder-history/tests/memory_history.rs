//! Behavior of the in-memory history stack.

use std::cell::RefCell;
use std::rc::Rc;

use rstest::{fixture, rstest};
use wayfinder_history::{History, HistoryAction, HistoryEvent, MemoryHistory};

#[fixture]
fn history() -> MemoryHistory {
	MemoryHistory::with_entries(["/", "/a", "/b"], 2)
}

fn record(history: &MemoryHistory) -> Rc<RefCell<Vec<HistoryEvent>>> {
	let events = Rc::new(RefCell::new(Vec::new()));
	let sink = events.clone();
	// The subscription handle is dropped on purpose: the listener stays registered.
	let _ = history.listen(Box::new(move |event: &HistoryEvent| {
		sink.borrow_mut().push(event.clone())
	}));
	events
}

#[rstest]
fn push_drops_forward_entries(history: MemoryHistory) {
	// Arrange
	history.go(-2);

	// Act
	history.push("/c?x=1", serde_json::json!({ "scroll": 10 }));

	// Assert
	let hrefs: Vec<String> = history.entries().into_iter().map(|entry| entry.href).collect();
	assert_eq!(hrefs, ["/", "/c?x=1"]);
	assert_eq!(history.index(), 1);
	assert_eq!(history.location().state.index, 1);
	assert_eq!(history.location().state.data["scroll"], 10);
}

#[rstest]
fn replace_keeps_stack_length(history: MemoryHistory) {
	let events = record(&history);

	history.replace("/b#section", serde_json::Value::Null);

	assert_eq!(history.length(), 3);
	assert_eq!(history.location().hash, "#section");
	assert_eq!(events.borrow()[0].action, HistoryAction::Replace);
}

#[rstest]
#[case(-1, "/a", Some(HistoryAction::Go))]
#[case(-5, "/", Some(HistoryAction::Go))]
#[case(1, "/b", None)]
#[case(0, "/b", None)]
fn go_is_clamped(
	history: MemoryHistory,
	#[case] delta: isize,
	#[case] pathname: &str,
	#[case] action: Option<HistoryAction>,
) {
	let events = record(&history);

	history.go(delta);

	assert_eq!(history.location().pathname, pathname);
	assert_eq!(events.borrow().first().map(|event| event.action), action);
}

#[rstest]
fn back_and_forward_report_their_action(history: MemoryHistory) {
	let events = record(&history);

	history.back();
	history.forward();

	let actions: Vec<HistoryAction> = events.borrow().iter().map(|event| event.action).collect();
	assert_eq!(actions, [HistoryAction::Back, HistoryAction::Forward]);
	assert!(actions.iter().all(|action| action.is_traversal()));
}

#[rstest]
fn location_is_updated_before_listeners_run(history: MemoryHistory) {
	let seen = Rc::new(RefCell::new(String::new()));
	let sink = seen.clone();
	let probe = history.clone();
	let subscription = history.listen(Box::new(move |_: &HistoryEvent| {
		*sink.borrow_mut() = probe.location().href;
	}));

	history.push("/next", serde_json::Value::Null);

	assert_eq!(*seen.borrow(), "/next");
	subscription.unsubscribe();
}

#[rstest]
fn unsubscribed_listener_is_not_called(history: MemoryHistory) {
	let calls = Rc::new(RefCell::new(0));
	let sink = calls.clone();
	let subscription = history.listen(Box::new(move |_: &HistoryEvent| *sink.borrow_mut() += 1));

	history.push("/x", serde_json::Value::Null);
	subscription.unsubscribe();
	history.push("/y", serde_json::Value::Null);

	assert_eq!(*calls.borrow(), 1);
}

#[rstest]
fn can_go_back_follows_index(history: MemoryHistory) {
	assert!(history.can_go_back());

	history.go(-2);

	assert!(!history.can_go_back());
}

use tokio_hfsm::{Code, Codes, Event, SmEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Codes)]
enum Tcp {
    Listen,
    SynSent,
    Established,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Codes)]
#[codes(base = 100)]
enum Http {
    Request,
    #[codes(label = "resp")]
    Response,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Codes)]
#[codes(after = SmEvent)]
enum Login {
    Submit,
    Retry,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Codes)]
#[codes(after = Login)]
enum Admin {
    Promote,
}

#[test]
fn test_default_base_starts_at_zero() {
    assert_eq!(Tcp::Listen.code(), 0);
    assert_eq!(Tcp::Established.code(), 2);
    assert_eq!(Tcp::FIRST_CODE, 0);
    assert_eq!(Tcp::NEXT_CODE, 3);
    assert_eq!(Tcp::ALL, &[Tcp::Listen, Tcp::SynSent, Tcp::Established]);
}

#[test]
fn test_explicit_base_and_label() {
    assert_eq!(Http::Request.code(), 100);
    assert_eq!(Http::Response.code(), 101);
    assert_eq!(Http::Request.label(), Some("Request"));
    assert_eq!(Http::Response.label(), Some("resp"));
    assert_eq!(u32::from(Http::Response), 101);
}

#[test]
fn test_after_chains_namespaces() {
    assert_eq!(Login::Submit.code(), SmEvent::NEXT_CODE);
    assert_eq!(Login::Retry.code(), SmEvent::NEXT_CODE + 1);
    assert_eq!(Admin::Promote.code(), Login::NEXT_CODE);
    assert_eq!(Admin::FIRST_CODE, SmEvent::NEXT_CODE + 2);
}

#[test]
fn test_from_code_round_trips_only_own_codes() {
    for login in Login::ALL {
        assert_eq!(Login::from_code(login.code()), Some(*login));
    }
    assert_eq!(Login::from_code(SmEvent::Cancel.code()), None);
    assert_eq!(Login::from_code(Login::NEXT_CODE), None);
    assert_eq!(Http::from_code(0), None);
}

#[test]
fn test_label_becomes_event_mnemonic() {
    let event = Event::of(Login::Retry);
    assert_eq!(event.code(), Login::Retry.code());
    assert_eq!(event.mnemonic(), "Retry");
}

use rust_fsm::*;

state_machine! {
    chat_turn(Idle)

    Idle(HydrateSending) => Sending,
    Idle(HydrateStreaming) => Streaming,
    Idle(HydrateFailed) => Failed,

    Idle(Submit) => Sending,
    Sending(Accepted) => Streaming,
    Sending(Fail) => Failed,
    Sending(Cancel) => Idle,
    Streaming(Finish) => Idle,
    Streaming(Fail) => Failed,
    Streaming(Cancel) => Idle,
    Failed(Recover) => Idle
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChatPhase {
    #[default]
    Idle,
    Sending,
    Streaming,
    Failed,
}

impl ChatPhase {
    pub fn in_flight(self) -> bool {
        matches!(self, ChatPhase::Sending | ChatPhase::Streaming)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    Submit,
    /// Response headers arrived with a success status.
    Accepted,
    Fail,
    Finish,
    Recover,
    Cancel,
}

fn hydrate(machine: &mut chat_turn::StateMachine, phase: ChatPhase) -> Result<(), ()> {
    let input = match phase {
        ChatPhase::Idle => return Ok(()),
        ChatPhase::Sending => chat_turn::Input::HydrateSending,
        ChatPhase::Streaming => chat_turn::Input::HydrateStreaming,
        ChatPhase::Failed => chat_turn::Input::HydrateFailed,
    };
    machine.consume(&input).map_err(|_| ())?;
    Ok(())
}

fn expected_next_phase(current: ChatPhase, action: ChatAction) -> Option<ChatPhase> {
    match (current, action) {
        (ChatPhase::Idle, ChatAction::Submit) => Some(ChatPhase::Sending),
        (ChatPhase::Sending, ChatAction::Accepted) => Some(ChatPhase::Streaming),
        (ChatPhase::Sending, ChatAction::Fail) => Some(ChatPhase::Failed),
        (ChatPhase::Sending, ChatAction::Cancel) => Some(ChatPhase::Idle),
        (ChatPhase::Streaming, ChatAction::Finish) => Some(ChatPhase::Idle),
        (ChatPhase::Streaming, ChatAction::Fail) => Some(ChatPhase::Failed),
        (ChatPhase::Streaming, ChatAction::Cancel) => Some(ChatPhase::Idle),
        (ChatPhase::Failed, ChatAction::Recover) => Some(ChatPhase::Idle),
        _ => None,
    }
}

pub fn transition(current: ChatPhase, action: ChatAction) -> Option<ChatPhase> {
    let mut machine = chat_turn::StateMachine::new();
    hydrate(&mut machine, current).ok()?;

    let input = match action {
        ChatAction::Submit => chat_turn::Input::Submit,
        ChatAction::Accepted => chat_turn::Input::Accepted,
        ChatAction::Fail => chat_turn::Input::Fail,
        ChatAction::Finish => chat_turn::Input::Finish,
        ChatAction::Recover => chat_turn::Input::Recover,
        ChatAction::Cancel => chat_turn::Input::Cancel,
    };

    machine.consume(&input).ok()?;
    expected_next_phase(current, action)
}

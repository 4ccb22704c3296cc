//! Terminal input → viewer actions.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    Top,
    Bottom,
    ToggleFollow,
    Resize { width: u16, height: u16 },
}

/// Map a terminal event to an action. Unbound keys and releases map to `None`.
pub fn action_for(event: &Event) -> Option<Action> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => key_action(key),
        Event::Resize(width, height) => Some(Action::Resize {
            width: *width,
            height: *height,
        }),
        _ => None,
    }
}

fn key_action(key: &KeyEvent) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let action = match key.code {
        KeyCode::Char('c') if ctrl => Action::Quit,
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Up | KeyCode::Char('k') => Action::ScrollUp,
        KeyCode::Down | KeyCode::Char('j') => Action::ScrollDown,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown => Action::PageDown,
        KeyCode::Home | KeyCode::Char('g') => Action::Top,
        KeyCode::End | KeyCode::Char('G') => Action::Bottom,
        KeyCode::Char('f') => Action::ToggleFollow,
        _ => return None,
    };
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn vim_and_arrow_keys_scroll() {
        assert_eq!(action_for(&press(KeyCode::Char('k'))), Some(Action::ScrollUp));
        assert_eq!(action_for(&press(KeyCode::Up)), Some(Action::ScrollUp));
        assert_eq!(action_for(&press(KeyCode::Char('j'))), Some(Action::ScrollDown));
        assert_eq!(action_for(&press(KeyCode::Down)), Some(Action::ScrollDown));
    }

    #[test]
    fn jumps_and_follow() {
        assert_eq!(action_for(&press(KeyCode::Char('g'))), Some(Action::Top));
        assert_eq!(action_for(&press(KeyCode::Home)), Some(Action::Top));
        assert_eq!(action_for(&press(KeyCode::Char('G'))), Some(Action::Bottom));
        assert_eq!(action_for(&press(KeyCode::End)), Some(Action::Bottom));
        assert_eq!(action_for(&press(KeyCode::Char('f'))), Some(Action::ToggleFollow));
    }

    #[test]
    fn quit_on_q_and_ctrl_c_only() {
        assert_eq!(action_for(&press(KeyCode::Char('q'))), Some(Action::Quit));
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(action_for(&ctrl_c), Some(Action::Quit));
        assert_eq!(action_for(&press(KeyCode::Char('c'))), None);
    }

    #[test]
    fn releases_are_ignored_and_resize_is_forwarded() {
        let mut release = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(action_for(&Event::Key(release)), None);
        assert_eq!(
            action_for(&Event::Resize(120, 40)),
            Some(Action::Resize {
                width: 120,
                height: 40
            })
        );
    }
}

use ratatui::Frame;

use crate::{ui::render_history, App, AppState};

/// A UI Screen boundary: responsible for rendering one app state
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

/// Timer screen - renders the App widget
pub struct TimerScreen;

impl Screen for TimerScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        f.render_widget(app, f.area());
    }
}

/// History screen - list plus optional detail modal
pub struct HistoryScreen;

impl Screen for HistoryScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_history(app, f);
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Timer => Box::new(TimerScreen),
        AppState::History => Box::new(HistoryScreen),
    }
}

// License: MIT

//! Recoverable conditions. These never unwind or abort: the offending call
//! becomes a no-op, the condition is logged, and the most recent one stays
//! readable alongside the function that raised it.

use eventline as el;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    PreemptiveWindowCreation,
    DoubleWindowCreation,
    PreemptiveWindowFree,
    PreemptivePanelCreation,
    DoublePanelCreation,
    PreemptivePanelFree,
    DoublePanelFree,
    NullHandle,
}

impl Warning {
    pub fn as_str(self) -> &'static str {
        match self {
            Warning::PreemptiveWindowCreation => "preemptive_window_creation",
            Warning::DoubleWindowCreation => "double_window_creation",
            Warning::PreemptiveWindowFree => "preemptive_window_free",
            Warning::PreemptivePanelCreation => "preemptive_panel_creation",
            Warning::DoublePanelCreation => "double_panel_creation",
            Warning::PreemptivePanelFree => "preemptive_panel_free",
            Warning::DoublePanelFree => "double_panel_free",
            Warning::NullHandle => "null_handle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recorded {
    pub code: Warning,
    pub origin: &'static str,
}

#[derive(Debug, Default)]
pub struct WarningLog {
    last: Option<Recorded>,
}

impl WarningLog {
    pub fn report(&mut self, origin: &'static str, code: Warning) {
        el::warn!(
            "warning origin={origin} code={code}",
            origin = origin,
            code = code.as_str()
        );
        self.last = Some(Recorded { code, origin });
    }

    pub fn last(&self) -> Option<Recorded> {
        self.last
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_warning_tracks_origin() {
        let mut log = WarningLog::default();
        assert!(log.last().is_none());

        log.report("create_panel", Warning::PreemptivePanelCreation);
        log.report("destroy_panel", Warning::DoublePanelFree);

        let last = log.last().unwrap();
        assert_eq!(last.code, Warning::DoublePanelFree);
        assert_eq!(last.origin, "destroy_panel");

        log.clear();
        assert!(log.last().is_none());
    }
}

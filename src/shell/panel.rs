// License: MIT

//! Backdrop and panel lifecycle. Panels are an arena indexed by slot; the
//! render worker and layout engine never hold pointers into it.
//!
//! Ordering invariant: a panel's GPU context exists iff its surface and
//! sub-surface exist. Creation binds the context last; destruction releases
//! it first (context, EGL surface, sub-surface, surface).

use anyhow::Result;
use eventline as el;

use wayland_client::protocol::{wl_subsurface::WlSubsurface, wl_surface::WlSurface};
use wayland_protocols::xdg::shell::client::{
    xdg_surface::XdgSurface, xdg_toplevel::XdgToplevel,
};

use crate::layout::{Layout, Rect, compute};
use crate::shell::engine::{APP_ID, Engine};
use crate::shell::gpu::{GpuState, PanelGpu};
use crate::shell::shm;
use crate::warning::Warning;

/// Colour the backdrop is painted before GL output covers the panels.
const BACKDROP_COLOUR: u32 = 0xFF00_0000;

/// The three fixed panel slots. Slot identity is not runtime-selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Bust,
    Gameplay,
    Stat,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Bust, Slot::Gameplay, Slot::Stat];

    pub fn index(self) -> usize {
        match self {
            Slot::Bust => 0,
            Slot::Gameplay => 1,
            Slot::Stat => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Slot::Bust => "bust",
            Slot::Gameplay => "gameplay",
            Slot::Stat => "stat",
        }
    }

    /// Solid shm backing colour, pushed before the GL pass takes over.
    pub(crate) fn backing_colour(self) -> u32 {
        match self {
            Slot::Bust => 0xFF20_2020,
            Slot::Gameplay => 0xFF10_1010,
            Slot::Stat => 0xFF20_2020,
        }
    }

    /// GL clear colour for the render pass.
    pub(crate) fn clear_colour(self) -> [f32; 3] {
        match self {
            Slot::Gameplay => [1.0, 1.0, 1.0],
            Slot::Bust | Slot::Stat => [1.0, 0.0, 0.0],
        }
    }

    pub(crate) fn rect_in(self, layout: &Layout) -> Option<Rect> {
        match self {
            Slot::Bust => layout.bust,
            Slot::Gameplay => Some(layout.gameplay),
            Slot::Stat => layout.stat,
        }
    }
}

/// The single fullscreen toplevel behind all panels. Created first,
/// destroyed last.
pub(crate) struct Backdrop {
    pub(crate) surface: WlSurface,
    pub(crate) xdg: XdgSurface,
    pub(crate) toplevel: XdgToplevel,
    pub(crate) configured: bool,
}

#[derive(Default)]
pub(crate) struct Panel {
    pub(crate) rect: Option<Rect>,
    pub(crate) surface: Option<WlSurface>,
    pub(crate) subsurface: Option<WlSubsurface>,
    pub(crate) created_once: bool,
}

impl Panel {
    pub(crate) fn realized(&self) -> bool {
        self.surface.is_some() && self.subsurface.is_some()
    }
}

fn destroy_warning(realized: bool, created_once: bool) -> Option<Warning> {
    if realized {
        None
    } else if created_once {
        Some(Warning::DoublePanelFree)
    } else {
        Some(Warning::PreemptivePanelFree)
    }
}

impl Engine {
    /// Wrap a new raw surface as the managed fullscreen toplevel.
    pub fn create_window(&mut self, title: &str) {
        if self.backdrop.is_some() {
            self.warnings.report("create_window", Warning::DoubleWindowCreation);
            return;
        }
        let (Some(compositor), Some(wm_base)) =
            (self.compositor.as_ref(), self.wm_base.as_ref())
        else {
            self.warnings.report("create_window", Warning::PreemptiveWindowCreation);
            return;
        };

        let surface = compositor.create_surface(&self.qh, ());
        let xdg = wm_base.get_xdg_surface(&surface, &self.qh, ());
        let toplevel = xdg.get_toplevel(&self.qh, ());
        toplevel.set_app_id(APP_ID.into());
        toplevel.set_title(title.into());
        surface.commit();

        el::info!("window.created title={title}", title = title);
        self.backdrop = Some(Backdrop { surface, xdg, toplevel, configured: false });
    }

    pub fn set_title(&mut self, title: &str) {
        match self.backdrop.as_ref() {
            Some(b) => b.toplevel.set_title(title.into()),
            None => self.warnings.report("set_title", Warning::NullHandle),
        }
    }

    /// Realize one panel slot: surface, sub-surface of the backdrop, and a
    /// GPU context. Preconditions violated ⇒ recorded warning and no handle.
    pub fn create_panel(&mut self, slot: Slot) -> Option<Slot> {
        if self.panels[slot.index()].realized() {
            self.warnings.report("create_panel", Warning::DoublePanelCreation);
            return None;
        }
        if !self.shared.gpu_ready() {
            self.warnings.report("create_panel", Warning::PreemptivePanelCreation);
            return None;
        }
        let (Some(compositor), Some(subcompositor), Some(backdrop)) = (
            self.compositor.as_ref(),
            self.subcompositor.as_ref(),
            self.backdrop.as_ref(),
        ) else {
            self.warnings.report("create_panel", Warning::PreemptivePanelCreation);
            return None;
        };

        let surface = compositor.create_surface(&self.qh, ());
        let subsurface =
            subcompositor.get_subsurface(&surface, &backdrop.surface, &self.qh, ());
        // Panels present on their own cadence; the render worker swaps
        // independently of backdrop commits.
        subsurface.set_desync();

        let rect = self.layout.as_ref().and_then(|l| slot.rect_in(l));
        if let Some(r) = rect {
            subsurface.set_position(r.x, r.y);
        }

        {
            let mut gpu = self.shared.gpu_lock();
            let GpuState { instance, slots, .. } = &mut *gpu;
            let Some(inst) = instance.as_ref() else {
                drop(gpu);
                subsurface.destroy();
                surface.destroy();
                self.warnings.report("create_panel", Warning::PreemptivePanelCreation);
                return None;
            };
            match PanelGpu::new(inst, &surface) {
                Ok(mut p) => {
                    if let Some(r) = rect {
                        p.resize(r.width, r.height);
                    }
                    slots[slot.index()] = Some(p);
                }
                Err(e) => {
                    // GPU surface/context failure is unrecoverable.
                    drop(gpu);
                    subsurface.destroy();
                    surface.destroy();
                    self.fatal = Some(e);
                    return None;
                }
            }
        }

        surface.commit();
        el::info!(
            "panel.created slot={slot} positioned={positioned}",
            slot = slot.label(),
            positioned = rect.is_some()
        );

        self.panels[slot.index()] = Panel {
            rect,
            surface: Some(surface),
            subsurface: Some(subsurface),
            created_once: true,
        };
        Some(slot)
    }

    /// Tear down one panel slot in the strict order context, GPU surface,
    /// sub-surface, surface. Double or preemptive destroys warn and no-op.
    pub fn destroy_panel(&mut self, slot: Slot) {
        let state = &self.panels[slot.index()];
        if let Some(code) = destroy_warning(state.realized(), state.created_once) {
            self.warnings.report("destroy_panel", code);
            return;
        }

        {
            let mut gpu = self.shared.gpu_lock();
            let GpuState { instance, slots, .. } = &mut *gpu;
            if let (Some(p), Some(inst)) = (slots[slot.index()].take(), instance.as_ref()) {
                p.destroy(inst);
            }
        }

        let panel = &mut self.panels[slot.index()];
        if let Some(ss) = panel.subsurface.take() {
            ss.destroy();
        }
        if let Some(s) = panel.surface.take() {
            s.destroy();
        }
        panel.rect = None;

        el::info!("panel.destroyed slot={slot}", slot = slot.label());
    }

    /// Destroy the backdrop and every panel still realized. Panels go first;
    /// the backdrop owns them and must outlive them.
    pub fn destroy_window(&mut self) {
        if self.backdrop.is_none() {
            self.warnings.report("destroy_window", Warning::PreemptiveWindowFree);
            return;
        }
        for slot in Slot::ALL {
            if self.panels[slot.index()].realized() {
                self.destroy_panel(slot);
            }
        }
        if let Some(b) = self.backdrop.take() {
            b.toplevel.destroy();
            b.xdg.destroy();
            b.surface.destroy();
        }
        el::info!("window.destroyed");
    }

    /// Recompute geometry from the current bounds and push it everywhere:
    /// sub-surface positions, EGL surface sizes (under the GPU lock), solid
    /// repaints, then the redraw signal.
    pub(crate) fn apply_layout(&mut self) -> Result<()> {
        let Some((width, height)) = self.current_bounds() else {
            return Ok(());
        };
        let layout = compute(width, height)?;
        self.layout = Some(layout);
        el::info!(
            "layout.applied w={w} h={h} side={side}",
            w = width as i64,
            h = height as i64,
            side = layout.gameplay.width as i64
        );

        for slot in Slot::ALL {
            let rect = slot.rect_in(&layout);
            let panel = &mut self.panels[slot.index()];
            panel.rect = rect;
            if !panel.realized() {
                continue;
            }
            match rect {
                Some(r) => {
                    if let Some(ss) = panel.subsurface.as_ref() {
                        ss.set_position(r.x, r.y);
                    }
                    let mut gpu = self.shared.gpu_lock();
                    if let Some(p) = gpu.slots[slot.index()].as_mut() {
                        p.resize(r.width, r.height);
                    }
                }
                None => {
                    // Bounds went square after realization; the slot has no
                    // gap to live in any more.
                    el::warn!("layout.slot_unplaced slot={slot}", slot = slot.label());
                }
            }
        }

        if self.backdrop.as_ref().is_some_and(|b| b.configured) {
            self.paint_backdrop()?;
            for slot in Slot::ALL {
                self.paint_panel(slot)?;
            }
        }

        self.shared.signal_dimensions();
        Ok(())
    }

    /// First configure ack for the backdrop: realize the panels and give
    /// everything its first paint.
    pub(crate) fn on_backdrop_configured(&mut self) -> Result<()> {
        if self.panels_created {
            return Ok(());
        }
        self.panels_created = true;

        for slot in Slot::ALL {
            self.create_panel(slot);
        }
        self.paint_backdrop()?;
        for slot in Slot::ALL {
            self.paint_panel(slot)?;
        }

        if self.layout.is_some() {
            self.shared.signal_dimensions();
        }
        Ok(())
    }

    pub(crate) fn paint_backdrop(&mut self) -> Result<()> {
        let (Some(shm), Some(backdrop), Some((width, height))) =
            (self.shm.as_ref(), self.backdrop.as_ref(), self.current_bounds())
        else {
            return Ok(());
        };
        let buffer = shm::create_solid_buffer(shm, &self.qh, width, height, BACKDROP_COLOUR)?;
        backdrop.surface.attach(Some(&buffer), 0, 0);
        backdrop.surface.damage_buffer(0, 0, width, height);
        backdrop.surface.commit();
        Ok(())
    }

    /// Attach a freshly filled solid buffer sized to the panel's rectangle.
    /// Unsized or unrealized panels are skipped; they get painted once the
    /// layout places them.
    pub(crate) fn paint_panel(&mut self, slot: Slot) -> Result<()> {
        let Some(shm) = self.shm.as_ref() else {
            return Ok(());
        };
        let panel = &self.panels[slot.index()];
        let (Some(surface), Some(rect)) = (panel.surface.as_ref(), panel.rect) else {
            return Ok(());
        };

        let buffer =
            shm::create_solid_buffer(shm, &self.qh, rect.width, rect.height, slot.backing_colour())?;
        surface.attach(Some(&buffer), 0, 0);
        surface.damage_buffer(0, 0, rect.width, rect.height);
        surface.commit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_indices_are_stable() {
        for (i, slot) in Slot::ALL.into_iter().enumerate() {
            assert_eq!(slot.index(), i);
        }
    }

    #[test]
    fn unrealized_panel_has_no_handles() {
        let p = Panel::default();
        assert!(!p.realized());
        assert!(p.surface.is_none() && p.subsurface.is_none());
    }

    #[test]
    fn destroy_outcomes() {
        // Never created: preemptive. Created then freed: double. Live: ok.
        assert_eq!(destroy_warning(false, false), Some(Warning::PreemptivePanelFree));
        assert_eq!(destroy_warning(false, true), Some(Warning::DoublePanelFree));
        assert_eq!(destroy_warning(true, true), None);
    }

    #[test]
    fn gameplay_always_placed_side_slots_follow_gaps() {
        let landscape = compute(1920, 1080).unwrap();
        for slot in Slot::ALL {
            assert!(slot.rect_in(&landscape).is_some());
        }

        let square = compute(900, 900).unwrap();
        assert!(Slot::Gameplay.rect_in(&square).is_some());
        assert!(Slot::Bust.rect_in(&square).is_none());
        assert!(Slot::Stat.rect_in(&square).is_none());
    }
}

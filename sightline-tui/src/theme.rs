//! Nightgrid theme and cell color utilities.

use ratatui::style::{Color, Modifier, Style};
use sightline_core::{AnimationTimings, Cell, CellAnimation, TransitionPhase};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct NightgridTheme {
    pub bg: Color,
    pub bg_highlight: Color,
    pub bg_selected: Color,
    pub primary: Color,
    pub primary_dim: Color,
    pub accent: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub text: Color,
    pub text_dim: Color,
    pub text_muted: Color,
    pub border: Color,
    pub border_focus: Color,
    pub loading: Color,
    pub resolved: Color,
    pub mismatch: Color,
}

impl NightgridTheme {
    pub fn nightgrid() -> Self {
        Self {
            bg: Color::Rgb(12, 14, 20),
            bg_highlight: Color::Rgb(34, 38, 52),
            bg_selected: Color::Rgb(40, 60, 90),
            primary: Color::Rgb(110, 190, 255),
            primary_dim: Color::Rgb(60, 100, 140),
            accent: Color::Rgb(200, 140, 255),
            success: Color::Rgb(120, 220, 140),
            warning: Color::Rgb(240, 200, 90),
            error: Color::Rgb(255, 90, 90),
            info: Color::Rgb(110, 190, 255),
            text: Color::Rgb(230, 232, 240),
            text_dim: Color::Rgb(140, 146, 160),
            text_muted: Color::Rgb(80, 86, 100),
            border: Color::Rgb(70, 76, 92),
            border_focus: Color::Rgb(110, 190, 255),
            loading: Color::Rgb(140, 146, 160),
            resolved: Color::Rgb(120, 220, 140),
            mismatch: Color::Rgb(240, 200, 90),
        }
    }
}

/// Resting color for a cell's content.
pub fn cell_color(cell: &Cell, theme: &NightgridTheme) -> Color {
    match cell {
        Cell::Raw(value) if value.is_null() => theme.text_muted,
        Cell::Raw(_) => theme.text,
        Cell::Empty | Cell::Placeholder(_) => theme.text_dim,
        Cell::Loading => theme.loading,
        Cell::Resolved(_) => theme.resolved,
        Cell::Failed(_) => theme.error,
    }
}

/// Style for a cell, taking any running transition into account.
pub fn animated_style(
    cell: &Cell,
    animation: &CellAnimation<'_>,
    now: Instant,
    timings: &AnimationTimings,
    theme: &NightgridTheme,
) -> Style {
    let base = cell_color(cell, theme);
    let CellAnimation::Transitioning(transition) = animation else {
        return Style::default().fg(base);
    };
    let progress = transition.progress(now, timings);
    match transition.phase {
        TransitionPhase::Pulse => {
            // Two flashes over the pulse phase.
            let on = (progress * 4.0) as u32 % 2 == 0;
            let style = Style::default().fg(theme.error);
            if on {
                style.add_modifier(Modifier::BOLD)
            } else {
                style.add_modifier(Modifier::DIM)
            }
        }
        TransitionPhase::Hold => Style::default().fg(theme.error),
        TransitionPhase::FadeOut => Style::default().fg(blend(base, theme.bg, progress)),
        TransitionPhase::FadeIn => Style::default().fg(blend(theme.bg, base, progress)),
    }
}

/// Linear blend between two RGB colors; non-RGB colors snap at the midpoint.
pub fn blend(from: Color, to: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    match (from, to) {
        (Color::Rgb(r1, g1, b1), Color::Rgb(r2, g2, b2)) => {
            let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
            Color::Rgb(mix(r1, r2), mix(g1, g2), mix(b1, b2))
        }
        _ if t < 0.5 => from,
        _ => to,
    }
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Viewport scaling helpers

/// Uniform scale factor that fits the recorded viewport into the current
/// playback container. Recomputed by the controller whenever the container
/// is resized.
pub fn fit_scale(recorded: (u32, u32), container: (u32, u32)) -> f64 {
    let (rw, rh) = recorded;
    let (cw, ch) = container;
    if rw == 0 || rh == 0 || cw == 0 || ch == 0 {
        return 1.0;
    }
    let sx = cw as f64 / rw as f64;
    let sy = ch as f64 / rh as f64;
    sx.min(sy)
}

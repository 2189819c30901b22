//! Criterion benchmarks for the event-to-report hot path.
//!
//! Every key stroke and every mouse movement goes through
//! `InputState::apply`, so it should stay far below a microsecond.
//!
//! Run with:
//! ```bash
//! cargo bench --package btk-core --bench report_bench
//! ```

use btk_core::keymap::codes::*;
use btk_core::{Axis, InputEvent, InputState, KeySymbol, PointerButton};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_key_press_release(c: &mut Criterion) {
    let mut state = InputState::new();
    c.bench_function("key_press_release", |b| {
        b.iter(|| {
            let down = state.apply(InputEvent::Key { symbol: KeySymbol(KEY_A), pressed: true });
            let up = state.apply(InputEvent::Key { symbol: KeySymbol(KEY_A), pressed: false });
            black_box((down, up))
        })
    });
}

fn bench_key_with_full_rollover(c: &mut Criterion) {
    let mut state = InputState::new();
    for code in [KEY_1, KEY_2, KEY_3, KEY_4, KEY_5, KEY_6, KEY_7, KEY_8] {
        state.apply(InputEvent::Key { symbol: KeySymbol(code), pressed: true });
    }
    c.bench_function("key_press_with_eight_held", |b| {
        b.iter(|| {
            black_box(state.apply(InputEvent::Key { symbol: KeySymbol(KEY_9), pressed: true }))
        })
    });
}

fn bench_pointer_motion(c: &mut Criterion) {
    let mut state = InputState::new();
    state.apply(InputEvent::Button { button: PointerButton::Left, pressed: true });
    c.bench_function("pointer_motion", |b| {
        b.iter(|| black_box(state.apply(InputEvent::Motion { axis: Axis::X, delta: black_box(5) })))
    });
}

fn bench_decode_raw(c: &mut Criterion) {
    c.bench_function("decode_raw_event", |b| {
        b.iter(|| black_box(InputEvent::from_raw(black_box(EV_REL), black_box(REL_Y), -3)))
    });
}

criterion_group!(
    benches,
    bench_key_press_release,
    bench_key_with_full_rollover,
    bench_pointer_motion,
    bench_decode_raw
);
criterion_main!(benches);

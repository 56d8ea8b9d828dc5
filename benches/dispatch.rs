use std::cell::RefCell;
use std::rc::Rc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use switchboard::{
    ActivationRegistry, Capability, ComponentId, CompositionUpdate, Coordinator,
    CoordinatorConfig, EngineContext, EngineDescriptor, EventFlow, InputEvent, InputMethodEngine,
    LogEvent, LogSink, Logger, LoggingResult, Rect, ScriptedHost, SharedActivation, SharedEngine,
};

#[derive(Clone, Default)]
struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _event: &LogEvent) -> LoggingResult<()> {
        Ok(())
    }
}

/// Buffers typed characters as preedit and commits the run on Enter.
#[derive(Default)]
struct SyllableEngine {
    buffer: String,
}

impl InputMethodEngine for SyllableEngine {
    fn name(&self) -> &str {
        "bench.syllable"
    }

    fn activate(&mut self) {}

    fn deactivate(&mut self, _temporary: bool) {}

    fn set_locale(&mut self, locale: &str) -> bool {
        locale == "ja"
    }

    fn composition_enabled(&self) -> Capability<bool> {
        Ok(!self.buffer.is_empty())
    }

    fn set_composition_enabled(&mut self, _enabled: bool) -> Capability<()> {
        Ok(())
    }

    fn end_composition(&mut self, ctx: &mut EngineContext) {
        if !self.buffer.is_empty() {
            let text = std::mem::take(&mut self.buffer);
            ctx.emit(CompositionUpdate::commit(text));
        }
    }

    fn handle_event(&mut self, ctx: &mut EngineContext, event: &InputEvent) -> EventFlow {
        if let InputEvent::Key(key) = event {
            match key.code {
                KeyCode::Char(ch) => {
                    self.buffer.push(ch);
                    let caret = self.buffer.chars().count();
                    ctx.emit(CompositionUpdate::preedit(self.buffer.clone(), Some(caret)));
                    return EventFlow::Consumed;
                }
                KeyCode::Enter => {
                    let text = std::mem::take(&mut self.buffer);
                    if !text.is_empty() {
                        ctx.emit(CompositionUpdate::commit(text));
                    }
                    return EventFlow::Consumed;
                }
                _ => {}
            }
        }
        EventFlow::Continue
    }
}

struct BenchSession {
    coordinator: Coordinator,
    clients: Vec<ComponentId>,
}

fn build_session(client_count: usize) -> BenchSession {
    let host = Rc::new(RefCell::new(ScriptedHost::new()));
    let clients: Vec<ComponentId> = {
        let mut h = host.borrow_mut();
        (0..client_count)
            .map(|idx| {
                let window = h.add_window(Rect::new(0, (idx as u16) * 12, 80, 10));
                h.add_component(window)
            })
            .collect()
    };
    host.borrow_mut().set_focused(clients.first().copied());

    let activation: SharedActivation = Rc::new(ActivationRegistry::new());
    let mut config = CoordinatorConfig::default();
    config.logger = Some(Logger::new(NullSink));
    config.enable_metrics();
    let mut coordinator = Coordinator::with_config(host, activation, config);

    coordinator.register_engine(
        EngineDescriptor::new(
            "bench.syllable",
            Rc::new(|| Ok(Rc::new(RefCell::new(SyllableEngine::default())) as SharedEngine)),
        )
        .with_locales(["ja"]),
    );
    coordinator.select_locale("ja");

    BenchSession {
        coordinator,
        clients,
    }
}

fn key(ch: char) -> InputEvent {
    InputEvent::Key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE))
}

fn typing_script() -> Vec<InputEvent> {
    let mut events = Vec::with_capacity(120);
    for _ in 0..10 {
        for ch in "nihongo".chars() {
            events.push(key(ch));
        }
        events.push(InputEvent::Key(KeyEvent::new(
            KeyCode::Enter,
            KeyModifiers::NONE,
        )));
    }
    events
}

fn dispatch_typing_script(c: &mut Criterion) {
    let script = typing_script();
    c.bench_function("dispatch_typing_script", |b| {
        b.iter(|| {
            let mut session = build_session(1);
            session
                .coordinator
                .run_scripted(black_box(script.clone()));
        });
    });
}

fn dispatch_focus_bounce_script(c: &mut Criterion) {
    c.bench_function("dispatch_focus_bounce_script", |b| {
        b.iter(|| {
            let mut session = build_session(2);
            let a = session.clients[0];
            let bb = session.clients[1];
            let mut script = vec![InputEvent::FocusGained(a)];
            for _ in 0..20 {
                script.push(key('k'));
                script.push(key('a'));
                // Focus jumps while composition is live; the bounce flushes
                // the preedit before the switch completes.
                script.push(InputEvent::FocusGained(bb));
                script.push(key('n'));
                script.push(key('a'));
                script.push(InputEvent::FocusGained(a));
            }
            session.coordinator.run_scripted(black_box(script));
        });
    });
}

criterion_group!(benches, dispatch_typing_script, dispatch_focus_bounce_script);
criterion_main!(benches);

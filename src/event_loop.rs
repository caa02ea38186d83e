use std::io;
use std::time::Duration;

use crossterm::event::Event;

use crate::drivers::InputDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    Quit,
}

/// What the loop hands its handler on each turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// A frame boundary: advance animations and redraw.
    Frame,
    Input(Event),
}

/// Synchronous frame pump for the UI thread.
///
/// Every turn starts with a [`LoopEvent::Frame`], then waits up to
/// `frame_interval` for input and drains everything that is queued. Panel
/// transitions are timed on the tokio clock, so the interval only bounds how
/// smooth they look, not how long they take.
pub struct EventLoop<D> {
    driver: D,
    frame_interval: Duration,
}

impl<D: InputDriver> EventLoop<D> {
    pub fn new(driver: D, frame_interval: Duration) -> Self {
        Self {
            driver,
            frame_interval,
        }
    }

    pub fn driver(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Run one turn. Returns `Quit` as soon as the handler asks for it.
    pub fn turn<F>(&mut self, handler: &mut F) -> io::Result<ControlFlow>
    where
        F: FnMut(LoopEvent) -> io::Result<ControlFlow>,
    {
        if handler(LoopEvent::Frame)? == ControlFlow::Quit {
            return Ok(ControlFlow::Quit);
        }
        if !self.driver.poll(self.frame_interval)? {
            return Ok(ControlFlow::Continue);
        }
        // Drain bursts (drags, pastes) in one turn so input never lags
        // behind rendering.
        loop {
            let event = self.driver.read()?;
            if handler(LoopEvent::Input(event))? == ControlFlow::Quit {
                return Ok(ControlFlow::Quit);
            }
            if !self.driver.poll(Duration::ZERO)? {
                return Ok(ControlFlow::Continue);
            }
        }
    }

    /// Take over the current thread until the handler quits.
    pub fn run<F>(&mut self, mut handler: F) -> io::Result<()>
    where
        F: FnMut(LoopEvent) -> io::Result<ControlFlow>,
    {
        while self.turn(&mut handler)? == ControlFlow::Continue {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::ScriptedInput;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn key(c: char) -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
    }

    #[test]
    fn turn_drains_queued_input_after_a_frame() {
        let mut event_loop = EventLoop::new(
            ScriptedInput::new([key('a'), key('b')]),
            Duration::ZERO,
        );
        let mut seen = Vec::new();
        let flow = event_loop
            .turn(&mut |event| {
                seen.push(event);
                Ok(ControlFlow::Continue)
            })
            .unwrap();
        assert_eq!(flow, ControlFlow::Continue);
        assert_eq!(
            seen,
            vec![
                LoopEvent::Frame,
                LoopEvent::Input(key('a')),
                LoopEvent::Input(key('b'))
            ]
        );
        assert_eq!(event_loop.driver().remaining(), 0);
    }

    #[test]
    fn run_stops_on_quit() {
        let mut event_loop = EventLoop::new(
            ScriptedInput::new([key('x'), key('q'), key('z')]),
            Duration::ZERO,
        );
        let mut frames = 0;
        event_loop
            .run(|event| match event {
                LoopEvent::Frame => {
                    frames += 1;
                    Ok(ControlFlow::Continue)
                }
                LoopEvent::Input(e) if e == key('q') => Ok(ControlFlow::Quit),
                LoopEvent::Input(_) => Ok(ControlFlow::Continue),
            })
            .unwrap();
        assert_eq!(frames, 1);
        assert_eq!(event_loop.driver().remaining(), 1);
    }
}

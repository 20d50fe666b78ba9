use beatline_engine::{
    ChannelSink, Engine, EngineCommand, Instrument, NoteCommand, RoutingGraph, SchedulerConfig,
    Sequencer, SystemClock, shared_graph,
};
use beatline_shared::{GroupEvent, GroupPattern, MidiClip, MidiClipEvent};
use crossbeam_channel::unbounded;
use log::info;
use std::thread;
use std::time::Duration;

/// Kick on every beat, a hat line gated to the second half of each bar.
fn demo_room() -> Result<RoutingGraph, anyhow::Error> {
    let mut graph = RoutingGraph::new();
    let drums = graph.add_node(Instrument::new("drums"))?;

    let kick_steps = (0..4).map(|beat| MidiClipEvent::new(f64::from(beat), 0.25, 36));
    let kick = MidiClip::with_events(4.0, true, kick_steps)?;
    let hat_steps = [MidiClipEvent::new(0.0, 0.1, 42), MidiClipEvent::new(0.5, 0.1, 42)];
    let hats = MidiClip::with_events(1.0, true, hat_steps)?;

    let kick = graph.add_node(Sequencer::new("kick", kick))?;
    let hats = graph.add_node(Sequencer::new("hats", hats))?;
    graph.connect(kick, drums, 0)?;
    graph.connect(hats, drums, 0)?;

    let mut gate = GroupPattern::new("hat gate", 4.0, 1.0, 1);
    gate.groups[0].events = vec![GroupEvent { start_beat: 2.0, length: 2.0, on: true }];
    let gate = graph.add_node(gate)?;
    graph.connect(gate, hats, 0)?;

    Ok(graph)
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => SchedulerConfig::load(&path)?,
        None => SchedulerConfig::default(),
    };
    info!("[Headless] Using config: {config:?}");

    let (cmd_tx, cmd_rx) = unbounded();
    let (note_tx, note_rx) = unbounded();
    let graph = shared_graph(demo_room()?);
    let sink = ChannelSink::new(note_tx);
    let mut engine = Engine::new(config, cmd_rx, graph, sink, SystemClock::default());

    let printer = thread::spawn(move || {
        for command in note_rx {
            match command {
                NoteCommand::NoteOn { note, delay, .. } => println!("on  {note:3} in {delay:.3}s"),
                NoteCommand::NoteOff { note, delay, .. } => println!("off {note:3} in {delay:.3}s"),
                NoteCommand::Panic { instrument } => println!("panic {instrument}"),
            }
        }
    });

    let tick_interval = Duration::from_millis(25);
    let ticker = thread::spawn(move || {
        let mut started = false;
        loop {
            engine.tick();
            if engine.is_playing() {
                started = true;
            } else if started {
                break;
            }
            thread::sleep(tick_interval);
        }
        engine.shutdown();
    });

    info!("[Headless] Playing for 4 seconds...");
    cmd_tx.send(EngineCommand::Play)?;
    thread::sleep(Duration::from_secs(2));
    cmd_tx.send(EngineCommand::SetBpm(150.0))?;
    thread::sleep(Duration::from_secs(2));

    info!("[Headless] Stopping...");
    cmd_tx.send(EngineCommand::Stop)?;
    ticker.join().map_err(|_| anyhow::anyhow!("tick thread panicked"))?;
    printer.join().map_err(|_| anyhow::anyhow!("printer thread panicked"))?;

    info!("[Headless] Done.");
    Ok(())
}

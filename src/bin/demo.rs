// src/bin/demo.rs
// Program entrypoint: selects a bundled demo and runs it to completion,
// replacing the source crate's hardcoded `scenarios::simple_demo::run()`
// call with an explicit choice.

use clap::{Parser, ValueEnum};

use agentsim::clock::ClockMode;
use agentsim::demo_agents::{alarm_clock, broadcast, class_tag, ping_pong};
use agentsim::message::AgentId;
use agentsim::scheduler::{RunOptions, Scheduler, SchedulerConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Demo {
    PingPong,
    Broadcast,
    Alarm,
    ClassTag,
}

#[derive(Debug, Parser)]
#[command(name = "demo", about = "Run one of the bundled agentsim demos")]
struct Cli {
    #[arg(value_enum, default_value = "ping-pong")]
    demo: Demo,

    /// Simulated virtual time instead of wall-clock tracking.
    #[arg(long)]
    simulated: bool,

    /// Maximum number of scheduler cycles to run before stopping.
    #[arg(long, default_value_t = 20)]
    iterations: usize,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mode = if cli.simulated { ClockMode::Simulated } else { ClockMode::Real };
    let mut scheduler = Scheduler::new(SchedulerConfig {
        mode,
        strict: false,
        ..Default::default()
    });

    match cli.demo {
        Demo::PingPong => {
            let ping_id = AgentId::new();
            let pong_id = AgentId::new();
            scheduler
                .add(Box::new(ping_pong::PongAgent::new(pong_id, ping_id)))
                .expect("register pong agent");
            scheduler
                .add(Box::new(ping_pong::PingAgent::new(ping_id, pong_id, 10)))
                .expect("register ping agent");
        }
        Demo::Broadcast => {
            scheduler
                .add(Box::new(broadcast::TickPublisher::new(100)))
                .expect("register publisher");
            scheduler
                .add(Box::new(broadcast::TickSubscriber::default()))
                .expect("register subscriber");
            scheduler
                .add(Box::new(broadcast::TickSubscriber::default()))
                .expect("register subscriber");
        }
        Demo::Alarm => {
            scheduler
                .add(Box::new(alarm_clock::AlarmDemo::new(1_000.0)))
                .expect("register alarm agent");
        }
        Demo::ClassTag => {
            scheduler.add(Box::new(class_tag::Worker::default())).expect("register worker");
            scheduler.add(Box::new(class_tag::Worker::default())).expect("register worker");
            scheduler
                .add(Box::new(class_tag::Dispatcher::new(vec![1, 2, 3])))
                .expect("register dispatcher");
        }
    }

    scheduler
        .run(RunOptions {
            iterations: Some(cli.iterations),
            pause_if_idle: true,
            ..Default::default()
        })
        .expect("scheduler run failed");

    tracing::info!(now = scheduler.now(), cycle = scheduler.cycle(), "demo finished");
}

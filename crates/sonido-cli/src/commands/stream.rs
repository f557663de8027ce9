//! Open a realtime duplex/loopback stream through the host-API backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Args;
use sonido_io::{
    CallbackBufferProcessor, CallbackResult, DeviceId, FramesPerBuffer, OpenStreamConfig,
    SampleFormat, StreamFlags, StreamParameters, open_stream,
};

#[derive(Args)]
pub struct StreamArgs {
    /// Input device (substring match), or omit for render-only
    #[arg(short, long)]
    input: Option<String>,

    /// Output device (substring match), or omit for capture-only
    #[arg(short, long)]
    output: Option<String>,

    /// Sample rate; 0 uses the device default
    #[arg(long, default_value = "0")]
    sample_rate: f64,

    /// Frames per buffer; 0 lets the negotiator pick
    #[arg(long, default_value = "0")]
    frames: u32,

    /// Channel count per direction
    #[arg(long, default_value = "2")]
    channels: u16,
}

fn device_id(name: &Option<String>) -> DeviceId {
    match name {
        Some(n) => DeviceId::Named(n.clone()),
        None => DeviceId::Default,
    }
}

pub fn run(args: StreamArgs) -> anyhow::Result<()> {
    if args.input.is_none() && args.output.is_none() {
        anyhow::bail!("at least one of --input/--output is required (omit the other for half-duplex)");
    }

    let input = args.input.as_ref().map(|_| StreamParameters {
        device: device_id(&args.input),
        channel_count: args.channels,
        sample_format: SampleFormat::F32,
        suggested_latency: 0.02,
    });
    let output_requested = Some(StreamParameters {
        device: device_id(&args.output),
        channel_count: args.channels,
        sample_format: SampleFormat::F32,
        suggested_latency: 0.02,
    });
    let output = if args.output.is_some() || args.input.is_none() {
        output_requested
    } else {
        None
    };

    let frames_per_buffer = if args.frames == 0 {
        FramesPerBuffer::Unspecified
    } else {
        FramesPerBuffer::Frames(args.frames)
    };

    // Loopback: copy captured input straight to the output buffer, or emit
    // silence when render-only.
    let processor = Box::new(CallbackBufferProcessor::new(|input, output, _time| {
        for (o, i) in output.iter_mut().zip(input.iter().chain(std::iter::repeat(&0.0))) {
            *o = *i;
        }
        CallbackResult::Continue
    }));

    let mut stream = open_stream(
        OpenStreamConfig {
            input,
            output,
            sample_rate: args.sample_rate,
            frames_per_buffer,
            flags: StreamFlags::default(),
        },
        processor,
    )?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    stream.start()?;
    println!("Stream running. Press Ctrl+C to stop...");

    while running.load(Ordering::SeqCst) && stream.is_active() {
        std::thread::sleep(std::time::Duration::from_millis(100));
        let xruns = stream.xrun_flags();
        if xruns.any() {
            println!(
                "xrun: in_under={} in_over={} out_under={} out_over={} (cpu load {:.1}%)",
                xruns.input_underflow,
                xruns.input_overflow,
                xruns.output_underflow,
                xruns.output_overflow,
                stream.get_stream_cpu_load() * 100.0
            );
        }
    }

    stream.stop()?;
    println!("Done!");
    Ok(())
}

use pcbroute::*;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let operation = args.get(1).map(|s| s.as_str()).unwrap_or("isolate");

    match operation {
        "isolate" => demo_isolation_routing(),
        "pocket" => demo_pocket_clearing(),
        "drill" => demo_peck_drill(),
        "gerber" => demo_gerber_layer(),
        _ => {
            println!("Usage: pcbroute [isolate|pocket|drill|gerber]");
            println!("  isolate  - Isolation-route a single copper trace (default)");
            println!("  pocket   - Clear the inside of a closed copper pour");
            println!("  drill    - Peck-drill a single hole");
            println!("  gerber   - Parse an inline RS-274X snippet and isolation-route it");
        }
    }
}

fn report_line(label: &str, report: &OperationReport) {
    println!("{label}: {:?} ({} warning(s))", report.status, report.warnings.len());
    for warning in &report.warnings {
        println!("  - {warning}");
    }
    if let Some(error) = &report.error {
        println!("  error: {error}");
    }
}

fn summarize(output: &PipelineOutput) {
    println!(
        "{} plan(s), {} staydown link(s), {} rapid link(s)",
        output.plans.len(),
        output.optimizer_stats.staydown_links_used,
        output.optimizer_stats.rapid_links_used
    );
    let total_distance: f64 = output.metadata.iter().map(|m| m.total_distance_mm).sum();
    let total_time: f64 = output.metadata.iter().map(|m| m.estimated_time_seconds).sum();
    println!("total travel: {total_distance:.3}mm, estimated time: {total_time:.1}s");
}

fn demo_isolation_routing() {
    println!("pcbroute - isolation routing demo");
    println!("==================================\n");

    let config = Config::default();
    let pipeline = Pipeline::new(&config);

    let trace = Primitive::Trace {
        start: Point::new(0.0, 0.0),
        end: Point::new(40.0, 0.0),
        width: 0.3,
        interpolation: TraceInterpolation::Linear,
        polarity: Polarity::Dark,
    };

    let params = OperationParams {
        tool: Tool {
            diameter: 0.2,
            tool_type: ToolType::Endmill,
        },
        passes: 2,
        step_over: 0.5,
        cut_side: CutSide::Outside,
        cut_depth: -0.1,
        ..OperationParams::default()
    };

    let input = OperationInput {
        operation_id: OperationId::new(),
        primitives: vec![trace],
        params,
    };

    let cancellation = CancellationToken::new();
    let output = pipeline
        .run(&[input], &cancellation)
        .expect("isolation routing demo");
    for report in &output.reports {
        report_line("isolation", report);
    }
    summarize(&output);
}

fn demo_pocket_clearing() {
    println!("pcbroute - pocket clearing demo");
    println!("================================\n");

    let config = Config::default();
    let pipeline = Pipeline::new(&config);

    let pour = Primitive::Rectangle {
        x: 0.0,
        y: 0.0,
        w: 20.0,
        h: 20.0,
        rotation: 0.0,
        polarity: Polarity::Dark,
    };

    let params = OperationParams {
        tool: Tool {
            diameter: 1.0,
            tool_type: ToolType::Endmill,
        },
        passes: 4,
        step_over: 0.4,
        cut_side: CutSide::Inside,
        cut_depth: -0.5,
        ..OperationParams::default()
    };

    let input = OperationInput {
        operation_id: OperationId::new(),
        primitives: vec![pour],
        params,
    };

    let cancellation = CancellationToken::new();
    let output = pipeline
        .run(&[input], &cancellation)
        .expect("pocket clearing demo");
    for report in &output.reports {
        report_line("pocket", report);
    }
    summarize(&output);
}

fn demo_peck_drill() {
    println!("pcbroute - peck drill demo");
    println!("===========================\n");

    let config = Config::default();
    let compiler = ToolpathCompiler::new(&config);
    let params = OperationParams {
        tool: Tool {
            diameter: 0.8,
            tool_type: ToolType::Endmill,
        },
        cut_depth: -1.8,
        depth_per_pass: 0.6,
        canned_cycle: CannedCycle::PeckDrill,
        peck_depth: 0.6,
        retract_height: 2.0,
        ..OperationParams::default()
    };

    let drill = compiler::DrillPoint {
        position: Point::new(0.0, 0.0),
        diameter: 0.8,
    };
    match compiler.compile_drill(drill, &params, OperationId::new()) {
        Ok(plan) => println!("Generated {} command(s) for the peck cycle", plan.commands.len()),
        Err(e) => eprintln!("Error: {e}"),
    }
}

fn demo_gerber_layer() {
    println!("pcbroute - Gerber layer demo");
    println!("=============================\n");

    let source = "%FSLAX26Y26*%\n%MOMM*%\n%ADD10C,0.20*%\nD10*\nX0Y0D02*\nX4000000Y0D01*\nM02*\n";

    let document = match gerber::parse(source) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error parsing Gerber: {e}");
            return;
        }
    };
    for warning in &document.warnings {
        println!("warning: {warning}");
    }

    let config = Config::default();
    let pipeline = Pipeline::new(&config);
    let params = OperationParams {
        tool: Tool {
            diameter: 0.2,
            tool_type: ToolType::Endmill,
        },
        passes: 1,
        step_over: 1.0,
        cut_side: CutSide::Outside,
        cut_depth: -0.1,
        ..OperationParams::default()
    };
    let input = OperationInput {
        operation_id: OperationId::new(),
        primitives: document.primitives,
        params,
    };
    let cancellation = CancellationToken::new();
    let output = pipeline.run(&[input], &cancellation).expect("gerber demo");
    for report in &output.reports {
        report_line("gerber layer", report);
    }
    summarize(&output);
}

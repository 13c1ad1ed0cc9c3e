use anyhow::Result;
use wedgetrace::fit::fit_wedges;
use wedgetrace::output::{self, RunSummary};
use wedgetrace::settings::{self};

fn main() -> Result<()> {
    let settings = settings::load_config()?;
    let stack = settings.build_stack();

    let reflections = stack.reflection_angles(settings.incident, settings.exact)?;
    let transmission = stack.transmission_angle(settings.incident, settings.exact)?;

    println!("reflection angles: {:?}", reflections);
    println!("transmission angle: {}", transmission);

    let mut summary = RunSummary::from_settings(&settings, reflections, transmission);

    if settings.run_fit {
        // The fit observes the stack at normal incidence.
        let observed = stack.reflection_angles(0.0, settings.exact)?;
        let fit = fit_wedges(
            &observed,
            settings.ambient_refr_index,
            &settings.refr_indices(),
            settings.exact,
            settings.max_wedge_angle,
            &settings.fit.to_options(),
        )?;
        println!(
            "recovered wedges in {} iterations, residual {}",
            fit.iterations, fit.residual
        );
        summary.attach_fit(&fit);
    }

    output::writeup(&summary, "wedgetrace_run.json")?;
    Ok(())
}

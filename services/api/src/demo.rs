use crate::infra::{build_engine, seed_demo_fleet, EngineWorld};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use clap::Args;
use levy_engine::config::LevySettings;
use levy_engine::error::AppError;
use levy_engine::levy::{GeoPoint, LedgerStream, ScanEvent, VehicleId};

#[derive(Args, Debug, Default)]
pub(crate) struct AccrueArgs {
    /// Accrual period (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) period: Option<NaiveDate>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the demo's reference date (defaults to today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) fn run_accrual(args: AccrueArgs) -> Result<(), AppError> {
    let period = args.period.unwrap_or_else(|| Local::now().date_naive());

    let world = build_engine(&LevySettings::default())?;
    seed_demo_fleet(&world)?;

    let summary = world.service.run_daily_accrual(period)?;
    println!("Accrual run for {period}");
    println!("- {} vehicle(s) assessed", summary.assessed);
    println!("- {} vehicle(s) frozen by waiver", summary.frozen);
    if summary.unconfigured.is_empty() {
        println!("- all categories had configured rates");
    } else {
        for vehicle in &summary.unconfigured {
            println!("- {vehicle}: category requires rate configuration");
        }
    }
    Ok(())
}

fn morning(day: NaiveDate, hour: u32) -> DateTime<Utc> {
    let naive = day
        .and_hms_opt(hour, 0, 0)
        .expect("demo hour is within range");
    Utc.from_utc_datetime(&naive)
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    println!("Vehicle levy compliance demo");
    let world = build_engine(&LevySettings::default())?;
    seed_demo_fleet(&world)?;

    let bus = VehicleId("veh-0001".to_string());
    let okada = VehicleId("veh-0002".to_string());

    println!("\nPrefunding {bus} with 4,200 operational cover");
    world
        .service
        .apply_payment(&bus, LedgerStream::Operational, 4_200)?;

    println!("Running the daily accrual tick for {today}");
    let summary = world.service.run_daily_accrual(today)?;
    println!(
        "- assessed {} vehicle(s), {} frozen, {} unconfigured",
        summary.assessed,
        summary.frozen,
        summary.unconfigured.len()
    );

    let view = world.service.wallet_status(&bus, today)?;
    println!(
        "- {bus}: clear={} operational balance {} / owing {}",
        view.clear, view.balances.operational, view.owings.operational
    );
    let due = world.service.next_payment_date(&bus, today)?;
    println!("- {bus}: next payment due {due}");

    println!("\nScanning {bus} inside Epe (declared stop)");
    let verdict = world.service.handle_scan(ScanEvent {
        vehicle_id: bus.clone(),
        point: GeoPoint::new(4.0, 6.55),
        recorded_at: morning(today, 9),
    })?;
    println!(
        "- on_route={} detected={:?} extra_charge={}",
        verdict.on_route, verdict.detected_lga, verdict.extra_charge
    );

    println!("\nScanning {bus} inside Badagry (off the declared route)");
    let verdict = world.service.handle_scan(ScanEvent {
        vehicle_id: bus.clone(),
        point: GeoPoint::new(2.93, 6.45),
        recorded_at: morning(today, 11),
    })?;
    println!(
        "- on_route={} detected={:?} extra_charge={}",
        verdict.on_route, verdict.detected_lga, verdict.extra_charge
    );

    let view = world.service.wallet_status(&bus, today)?;
    println!(
        "- {bus}: route surcharge owing now {}",
        view.owings.route_surcharge
    );

    println!("\nSettling the surcharge");
    let wallet = world
        .service
        .apply_payment(&bus, LedgerStream::RouteSurcharge, view.owings.route_surcharge)?;
    println!(
        "- route surcharge owing {} / balance {}",
        wallet.stream(LedgerStream::RouteSurcharge).owing,
        wallet.stream(LedgerStream::RouteSurcharge).balance
    );

    println!("\nScanning {okada} (no declared route) inside Ikorodu");
    let verdict = world.service.handle_scan(ScanEvent {
        vehicle_id: okada.clone(),
        point: GeoPoint::new(3.52, 6.62),
        recorded_at: morning(today, 12),
    })?;
    println!(
        "- on_route={} detected={:?} extra_charge={}",
        verdict.on_route, verdict.detected_lga, verdict.extra_charge
    );

    print_audit_trail(&world);
    Ok(())
}

fn print_audit_trail(world: &EngineWorld) {
    println!("\nAudit trail");
    for record in world.audit.entries() {
        println!(
            "- {} {} lga={} on_route={} extra_charge={} waived={}",
            record.recorded_at,
            record.vehicle_id,
            record
                .lga_id
                .as_ref()
                .map(|id| id.0.as_str())
                .unwrap_or("none"),
            record.on_route,
            record.extra_charge,
            record.waived
        );
    }
}

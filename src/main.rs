use std::process::ExitCode;

fn main() -> ExitCode {
    clinic_pulse_lib::run()
}

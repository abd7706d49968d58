use bioauth_biometric::{AuthController, Policy, failure_summary};

#[tokio::main]
async fn main() {
    env_logger::init();

    let controller = AuthController::platform();

    println!("Checking biometric availability...");
    for policy in [Policy::BiometricsOnly, Policy::BiometricsOrPasscode] {
        let capability = controller.probe(policy);
        match capability.reason() {
            None => println!("{policy:?}: available"),
            Some(reason) => println!("{policy:?}: unavailable ({reason})"),
        }
    }
    println!("Biometric type: {}", controller.biometry_kind().label());

    if !controller.is_biometrics_available() {
        println!("Biometrics not available on this machine.");
        return;
    }

    println!("Requesting authentication...");
    match controller.authenticate("Test authentication from Rust").await {
        Ok(success) => println!("✅ {}", success.message()),
        Err(kind) => {
            println!("❌ {}", failure_summary(kind));
            if kind.invalidates_context() {
                controller.reset();
            }
        }
    }

    println!("Running permit-and-auth...");
    let permitted = controller.permit_and_auth().await;
    println!("Permitted: {permitted}");
}

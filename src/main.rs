// Small end-to-end demo: learns y = 2x with a single dense unit.
// Set RUST_LOG=info (or debug) to see the training log. For the XOR demo run:
//   cargo run --example xor
use cobalt_nn::{
    ActivationFunction, Adam, Dense, EarlyStopping, Loss, Matrix, Model, Monitor, Sequential,
    TrainConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let x_train = Matrix::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 6, 1)?;
    let y_train = &x_train * 2.0;
    let x_val = Matrix::new(vec![1.5, 2.5, 3.5], 3, 1)?;
    let y_val = &x_val * 2.0;

    let network = Sequential::new().with(Dense::new(1, ActivationFunction::Linear));
    let mut model = Model::with_seed(network, 42).with_name("doubler");
    model.compile(Loss::mse(), Box::new(Adam::new(0.05)?));

    let mut early_stopping = EarlyStopping::new(Monitor::Validation, 50, 1e-9)?;
    let config = TrainConfig::new(3000).with_log_interval(250);
    let report = model.fit(
        &x_train,
        &y_train,
        Some((&x_val, &y_val)),
        &config,
        &mut [&mut early_stopping],
    )?;

    println!("{}", model.summary());
    println!(
        "ran {} epochs (stopped early: {}), final loss {:.6}",
        report.epochs_run, report.stopped_early, report.final_train_loss
    );

    let x_test = Matrix::new(vec![10.0, -3.0], 2, 1)?;
    let predictions = model.predict(&x_test)?;
    for (x, y) in x_test.as_slice().iter().zip(predictions.as_slice()) {
        println!("f({x}) = {y:.4}");
    }
    Ok(())
}

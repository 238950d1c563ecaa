use cobalt_nn::{ActivationFunction, Adam, Dense, History, Loss, Matrix, Model, Sequential, TrainConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let inputs = Matrix::from_data(vec![
        vec![1.0, 0.0],
        vec![1.0, 1.0],
        vec![0.0, 1.0],
        vec![0.0, 0.0],
    ])?;
    let expected_outputs = Matrix::from_data(vec![
        vec![1.0],
        vec![0.0],
        vec![1.0],
        vec![0.0],
    ])?;

    let network = Sequential::new()
        .with(Dense::new(4, ActivationFunction::Tanh))
        .with(Dense::new(1, ActivationFunction::Sigmoid));
    let mut model = Model::with_seed(network, 7).with_name("xor");
    model.compile(Loss::mse(), Box::new(Adam::new(0.05)?));

    let mut history = History::new();
    model.fit(&inputs, &expected_outputs, None, &TrainConfig::new(2000), &mut [&mut history])?;

    for (epoch, loss) in history.train_losses().iter().enumerate().step_by(200) {
        println!("Epoch {}: loss = {loss:.6}", epoch + 1);
    }

    let outputs = model.predict(&inputs)?;
    for (input, output) in inputs.to_rows().iter().zip(outputs.as_slice()) {
        println!("Input: {input:?} -> Output: {output:.4}");
    }
    println!("{}", model.summary());
    Ok(())
}

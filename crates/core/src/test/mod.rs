#[cfg(test)]
mod cache;

#[cfg(test)]
mod checker;

#[cfg(test)]
mod etc;

#[cfg(test)]
mod generator_script;

#[cfg(test)]
mod materializer;

#[cfg(test)]
mod matcher;

#[cfg(test)]
mod pio;

#[cfg(test)]
mod unit_tests;

#[cfg(test)]
mod walker;

// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

use chc_verifier::App;
use clap::Parser;

fn main() {
    App::parse().exec();
}
